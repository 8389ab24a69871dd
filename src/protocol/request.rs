use crate::cryptography::Signature;
use crate::error::{EncodingError, ProtocolError};
use crate::{PATH_LEN, REQUEST_FRAME_LEN, SIGNATURE_LEN, USERNAME_LEN};

const SIGNATURE_OFFSET: usize = USERNAME_LEN;
const LENGTH_OFFSET: usize = SIGNATURE_OFFSET + SIGNATURE_LEN;
const PAYLOAD_OFFSET: usize = LENGTH_OFFSET + 4;

/// A fixed-layout request: registration when the payload is empty, file
/// retrieval otherwise.
///
/// Unused bytes of the username and payload fields are always zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    username: [u8; USERNAME_LEN],
    signature: Signature,
    payload_length: u32,
    payload: [u8; PATH_LEN],
}

impl RequestFrame {
    /// Builds a registration request (`payload_length = 0`, zeroed payload).
    pub fn encode_register(username: &str, signature: &Signature) -> Result<Self, EncodingError> {
        Ok(Self {
            username: pack_username(username)?,
            signature: *signature,
            payload_length: 0,
            payload: [0u8; PATH_LEN],
        })
    }

    /// Builds a retrieval request for `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the username or path does not fit its field, is
    /// empty, or contains a NUL byte. Nothing is ever truncated.
    pub fn encode_retrieve(
        username: &str,
        signature: &Signature,
        path: &str,
    ) -> Result<Self, EncodingError> {
        let username = pack_username(username)?;

        if path.is_empty() {
            return Err(EncodingError::EmptyPath);
        }
        if path.len() > PATH_LEN {
            return Err(EncodingError::PathTooLong { len: path.len(), max: PATH_LEN });
        }
        if path.as_bytes().contains(&0) {
            return Err(EncodingError::PathContainsNul);
        }

        let mut payload = [0u8; PATH_LEN];
        payload[..path.len()].copy_from_slice(path.as_bytes());

        Ok(Self {
            username,
            signature: *signature,
            // path.len() <= PATH_LEN (128), fits in u32
            payload_length: path.len() as u32,
            payload,
        })
    }

    /// Parses a request as a server would see it.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != REQUEST_FRAME_LEN {
            return Err(ProtocolError::MalformedRequest { reason: "wrong frame length" });
        }

        let mut username = [0u8; USERNAME_LEN];
        username.copy_from_slice(&bytes[..SIGNATURE_OFFSET]);
        let name_len = username.iter().position(|&b| b == 0).unwrap_or(USERNAME_LEN);
        if name_len == 0 || std::str::from_utf8(&username[..name_len]).is_err() {
            return Err(ProtocolError::MalformedRequest { reason: "bad username" });
        }

        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&bytes[SIGNATURE_OFFSET..LENGTH_OFFSET]);

        let payload_length = read_u32(bytes, LENGTH_OFFSET);
        if payload_length as usize > PATH_LEN {
            return Err(ProtocolError::MalformedRequest {
                reason: "payload length exceeds capacity",
            });
        }

        let mut payload = [0u8; PATH_LEN];
        payload.copy_from_slice(&bytes[PAYLOAD_OFFSET..]);
        if std::str::from_utf8(&payload[..payload_length as usize]).is_err() {
            return Err(ProtocolError::MalformedRequest { reason: "path is not utf-8" });
        }

        Ok(Self {
            username,
            signature: Signature::from_bytes(signature),
            payload_length,
            payload,
        })
    }

    /// Serializes the frame in wire order.
    pub fn to_bytes(&self) -> [u8; REQUEST_FRAME_LEN] {
        let mut wire = [0u8; REQUEST_FRAME_LEN];
        wire[..SIGNATURE_OFFSET].copy_from_slice(&self.username);
        wire[SIGNATURE_OFFSET..LENGTH_OFFSET].copy_from_slice(self.signature.as_bytes());
        wire[LENGTH_OFFSET..PAYLOAD_OFFSET].copy_from_slice(&self.payload_length.to_be_bytes());
        wire[PAYLOAD_OFFSET..].copy_from_slice(&self.payload);
        wire
    }

    pub fn username(&self) -> &str {
        let len = self.username.iter().position(|&b| b == 0).unwrap_or(USERNAME_LEN);
        std::str::from_utf8(&self.username[..len]).unwrap_or_default()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn payload_length(&self) -> u32 {
        self.payload_length
    }

    pub fn is_registration(&self) -> bool {
        self.payload_length == 0
    }

    /// The requested path, `None` for a registration.
    pub fn path(&self) -> Option<&str> {
        if self.is_registration() {
            return None;
        }
        std::str::from_utf8(&self.payload[..self.payload_length as usize]).ok()
    }
}

fn pack_username(username: &str) -> Result<[u8; USERNAME_LEN], EncodingError> {
    if username.is_empty() {
        return Err(EncodingError::EmptyUsername);
    }
    if username.len() > USERNAME_LEN {
        return Err(EncodingError::UsernameTooLong { len: username.len(), max: USERNAME_LEN });
    }
    if username.as_bytes().contains(&0) {
        return Err(EncodingError::UsernameContainsNul);
    }

    let mut field = [0u8; USERNAME_LEN];
    field[..username.len()].copy_from_slice(username.as_bytes());
    Ok(field)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(raw)
}
