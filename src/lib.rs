pub mod client;
pub mod commands;
pub mod config;
pub mod cryptography;
pub mod error;
pub mod networking;
pub mod output;
pub mod protocol;
pub mod reassembly;
pub mod salt_store;
pub mod utils;

pub use client::Client;
pub use error::FetchError;

/// Width of the null-padded username field in a request frame.
pub const USERNAME_LEN: usize = 16;
/// Longest password accepted from the user.
pub const PASSWORD_LEN: usize = 16;
/// SHA-256 output size; also the signature field width.
pub const SIGNATURE_LEN: usize = 32;
pub const SALT_LEN: usize = 64;
/// Capacity of the request payload (file path) field.
pub const PATH_LEN: usize = 128;

pub const REQUEST_HEADER_LEN: usize = USERNAME_LEN + SIGNATURE_LEN + 4;
pub const REQUEST_FRAME_LEN: usize = REQUEST_HEADER_LEN + PATH_LEN;
pub const RESPONSE_HEADER_LEN: usize = 80;

/// Status code the server uses for a successful response.
pub const STATUS_OK: u32 = 1;

pub const DEFAULT_MAX_BLOCK_LEN: u32 = 1024 * 1024;
pub const DEFAULT_MAX_RESPONSE_LEN: u64 = 256 * 1024 * 1024;
