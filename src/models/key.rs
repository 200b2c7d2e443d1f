//! Externally issued symmetric key material.

use base64::{Engine as _, engine::general_purpose};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// Longest key identifier the envelope format can carry.
pub const MAX_KEY_ID_LEN: usize = u8::MAX as usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyMaterialError {
    #[error("key identifier must not be empty")]
    EmptyKeyId,
    #[error("key identifier is {0} bytes, limit is 255")]
    KeyIdTooLong(usize),
    #[error("key is not valid base64")]
    InvalidEncoding,
    #[error("key decodes to {0} bytes, expected 32")]
    InvalidLength(usize),
}

/// A symmetric key plus the opaque identifier recorded in every envelope.
///
/// Owned by the caller (fetched from the parameter store) and lent to the
/// cipher for one call at a time. Key bytes are wiped on drop and never
/// appear in `Debug` output.
pub struct EncryptionKeyMaterial {
    key_id: String,
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl EncryptionKeyMaterial {
    pub fn new(key_id: impl Into<String>, key: [u8; KEY_LEN]) -> Result<Self, KeyMaterialError> {
        let key_id = key_id.into();
        if key_id.is_empty() {
            return Err(KeyMaterialError::EmptyKeyId);
        }
        if key_id.len() > MAX_KEY_ID_LEN {
            return Err(KeyMaterialError::KeyIdTooLong(key_id.len()));
        }
        Ok(Self {
            key_id,
            key: Zeroizing::new(key),
        })
    }

    /// Decode a base64 key (standard or URL-safe alphabet) as stored in the
    /// parameter store.
    pub fn from_base64(key_id: impl Into<String>, encoded: &str) -> Result<Self, KeyMaterialError> {
        let trimmed = encoded.trim();
        let decoded = Zeroizing::new(
            general_purpose::STANDARD
                .decode(trimmed)
                .or_else(|_| general_purpose::URL_SAFE.decode(trimmed))
                .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(trimmed))
                .map_err(|_| KeyMaterialError::InvalidEncoding)?,
        );
        let key: [u8; KEY_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| KeyMaterialError::InvalidLength(decoded.len()))?;
        Self::new(key_id, key)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub(crate) fn key_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl fmt::Debug for EncryptionKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKeyMaterial")
            .field("key_id", &self.key_id)
            .field("key", &"<redacted>")
            .finish()
    }
}
