//! # Wire Codec
//!
//! Request and response frames of the retrieval protocol. All integers are
//! big-endian.
//!
//! ```text
//! request:  username[16] | signature[32] | payload_length:u32 | payload[128]
//! response: block_payload_length:u32 | status_code:u32 | block_id:u32 |
//!           total_block_count:u32 | reserved[64] | payload[block_payload_length]
//! ```
//!
//! Encoding rejects oversized fields instead of truncating them, and the
//! response decoder refuses payload lengths above the configured limit
//! before anything is allocated for them.

pub mod request;
pub mod response;

pub use request::RequestFrame;
pub use response::{decode_header, ResponseHeader};

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_MAX_BLOCK_LEN, DEFAULT_MAX_RESPONSE_LEN};

/// Upper bounds applied to network-supplied lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameLimits {
    /// Largest single block payload accepted.
    pub max_block_len: u32,
    /// Largest reassembled response accepted.
    pub max_response_len: u64,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
            max_response_len: DEFAULT_MAX_RESPONSE_LEN,
        }
    }
}
