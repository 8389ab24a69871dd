use crate::error::ProtocolError;
use crate::{RESPONSE_HEADER_LEN, STATUS_OK};

/// The four meaningful fields of an 80-byte response header. Bytes 16..80
/// are reserved and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Length of the payload that follows this header.
    pub payload_len: u32,
    pub status: u32,
    /// Zero-based index of this block.
    pub block_id: u32,
    /// Number of blocks in the whole response; 0 means an empty result.
    pub total_blocks: u32,
}

impl ResponseHeader {
    /// A successful block header.
    pub fn block(block_id: u32, total_blocks: u32, payload_len: u32) -> Self {
        Self { payload_len, status: STATUS_OK, block_id, total_blocks }
    }

    /// A rejection carrying a `payload_len` byte message.
    pub fn rejection(status: u32, payload_len: u32) -> Self {
        Self { payload_len, status, block_id: 0, total_blocks: 1 }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Serializes the header; reserved bytes are zero.
    pub fn encode(&self) -> [u8; RESPONSE_HEADER_LEN] {
        let mut wire = [0u8; RESPONSE_HEADER_LEN];
        wire[0..4].copy_from_slice(&self.payload_len.to_be_bytes());
        wire[4..8].copy_from_slice(&self.status.to_be_bytes());
        wire[8..12].copy_from_slice(&self.block_id.to_be_bytes());
        wire[12..16].copy_from_slice(&self.total_blocks.to_be_bytes());
        wire
    }
}

/// Parses a response header and bounds-checks the payload length of
/// successful blocks.
///
/// A rejecting header is returned whatever its payload length, so the
/// rejection is reported as such; the caller decides whether its message is
/// small enough to read. No checks are made on `block_id` against
/// `total_blocks`; that belongs to the reassembly engine.
///
/// # Errors
///
/// Returns `MalformedHeader` if fewer than 80 bytes are given and
/// `BlockTooLarge` if a successful block announces more than `max_block_len`.
pub fn decode_header(bytes: &[u8], max_block_len: u32) -> Result<ResponseHeader, ProtocolError> {
    if bytes.len() < RESPONSE_HEADER_LEN {
        return Err(ProtocolError::MalformedHeader { len: bytes.len() });
    }

    let field = |offset: usize| {
        u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    };

    let header = ResponseHeader {
        payload_len: field(0),
        status: field(4),
        block_id: field(8),
        total_blocks: field(12),
    };

    if header.is_success() && header.payload_len > max_block_len {
        return Err(ProtocolError::BlockTooLarge { len: header.payload_len, max: max_block_len });
    }

    Ok(header)
}
