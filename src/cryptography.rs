use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::{SALT_LEN, SIGNATURE_LEN};

/// Per-user random string mixed into the password before hashing.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(String);

impl Salt {
    /// Wraps a salt read back from storage. Empty salts or salts with
    /// whitespace or ':' cannot round-trip through the store and are refused.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let storable = !value.is_empty()
            && value.chars().all(|c| c.is_ascii_graphic() && c != ':');
        storable.then_some(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt([{} chars])", self.0.len())
    }
}

/// SHA-256 of password followed by salt. The only proof of identity sent to
/// the server, so it is never printed.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature([REDACTED])")
    }
}

/// Generates a fresh salt of `SALT_LEN` characters from `[A-Za-z0-9]`.
pub fn generate_salt() -> Salt {
    let value: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    Salt(value)
}

/// Hashes `password ++ salt` with no separator.
///
/// Pure and deterministic: a client can rebuild the exact signature it
/// registered with from the password and its stored salt alone.
pub fn derive_signature(password: &str, salt: &Salt) -> Signature {
    let mut hasher = Sha256::default();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_str().as_bytes());
    Signature(hasher.finalize().into())
}

/// Lowercase hex SHA-256 of `data`, printed after a download so the user can
/// compare it with the server's copy.
pub fn digest_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
