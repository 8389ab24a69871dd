//! Error types shared by the codec, the reassembly engine and the client.
//!
//! Every failure ends the current request. Nothing here is retried by the
//! library; retry policy belongs to the caller.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Rejected user input while building a request frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("username is empty")]
    EmptyUsername,

    #[error("username is {len} bytes, the field holds at most {max}")]
    UsernameTooLong { len: usize, max: usize },

    #[error("username contains a NUL byte")]
    UsernameContainsNul,

    #[error("password is empty")]
    EmptyPassword,

    #[error("password is {len} bytes, at most {max} are accepted")]
    PasswordTooLong { len: usize, max: usize },

    #[error("path is empty")]
    EmptyPath,

    #[error("path is {len} bytes, the payload holds at most {max}")]
    PathTooLong { len: usize, max: usize },

    #[error("path contains a NUL byte")]
    PathContainsNul,
}

/// The bytes on the wire do not follow the protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("response header is {len} bytes, expected 80")]
    MalformedHeader { len: usize },

    #[error("block payload of {len} bytes exceeds the {max} byte limit")]
    BlockTooLarge { len: u32, max: u32 },

    #[error("response of {len} bytes exceeds the {max} byte limit")]
    ResponseTooLarge { len: u64, max: u64 },

    #[error("block id {block_id} is out of range for {total} blocks")]
    InvalidBlockId { block_id: u32, total: u32 },

    #[error("total block count changed from {expected} to {got}")]
    InconsistentTotal { expected: u32, got: u32 },

    #[error("expected a {expected} byte payload, got {got}")]
    PayloadLengthMismatch { expected: usize, got: usize },

    #[error("input arrived out of sequence")]
    OutOfSequence,

    #[error("malformed request frame: {reason}")]
    MalformedRequest { reason: &'static str },
}

/// Connect, read or write failures on the byte stream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("{host} did not resolve to any usable address")]
    NoAddress { host: String },

    #[error("could not bind local address {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum SaltStoreError {
    #[error("salt store {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("username {0:?} cannot be stored (contains ':' or a line break)")]
    InvalidUsername(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Outcome of a failed request, as seen by the caller.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    SaltStore(#[from] SaltStoreError),

    /// The server answered with a status other than success.
    #[error(
        "server rejected the request with status {status}: {}",
        .message.as_deref().unwrap_or("no message")
    )]
    Rejected { status: u32, message: Option<String> },
}

impl FetchError {
    /// True for an application-level rejection, as opposed to a broken exchange.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
