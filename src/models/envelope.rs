//! On-the-wire layout of an encrypted object.
//!
//! ```text
//! +--------+-------------+-----------+----------------------------+
//! | id_len |   key id    |   nonce   |   ciphertext || GCM tag    |
//! |  (u8)  | id_len bytes| 12 bytes  |  plaintext len + 16 bytes  |
//! +--------+-------------+-----------+----------------------------+
//! ```
//!
//! The key-identifier field is framed as a one-byte length followed by the
//! UTF-8 id, since ids vary in length and the nonce must be locatable
//! without knowing the id in advance. Ids are therefore 1 to 255 bytes.
//!
//! Previously stored objects must keep decoding, so this layout is fixed.

use super::key::MAX_KEY_ID_LEN;
use thiserror::Error;

/// AES-GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeFormatError {
    #[error("envelope truncated: need at least {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("key identifier length {0} is outside 1..=255")]
    KeyIdLength(usize),
    #[error("key identifier is not valid UTF-8")]
    KeyIdEncoding,
}

/// Ciphertext plus the identifier of the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherEnvelope {
    key_id: String,
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl CipherEnvelope {
    pub fn new(
        key_id: impl Into<String>,
        nonce: [u8; NONCE_LEN],
        ciphertext: Vec<u8>,
    ) -> Result<Self, EnvelopeFormatError> {
        let key_id = key_id.into();
        if key_id.is_empty() || key_id.len() > MAX_KEY_ID_LEN {
            return Err(EnvelopeFormatError::KeyIdLength(key_id.len()));
        }
        if ciphertext.len() < TAG_LEN {
            return Err(EnvelopeFormatError::Truncated {
                needed: TAG_LEN,
                actual: ciphertext.len(),
            });
        }
        Ok(Self {
            key_id,
            nonce,
            ciphertext,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Ciphertext with the authentication tag appended.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_LEN)
    }

    pub fn encoded_len(&self) -> usize {
        1 + self.key_id.len() + NONCE_LEN + self.ciphertext.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        // `new` bounds the id to 255 bytes.
        out.push(self.key_id.len() as u8);
        out.extend_from_slice(self.key_id.as_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeFormatError> {
        let Some((&id_len, rest)) = bytes.split_first() else {
            return Err(EnvelopeFormatError::Truncated {
                needed: 1,
                actual: 0,
            });
        };
        let id_len = id_len as usize;
        if id_len == 0 {
            return Err(EnvelopeFormatError::KeyIdLength(0));
        }

        let needed = 1 + id_len + NONCE_LEN + TAG_LEN;
        if bytes.len() < needed {
            return Err(EnvelopeFormatError::Truncated {
                needed,
                actual: bytes.len(),
            });
        }

        let (id_bytes, rest) = rest.split_at(id_len);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
        let key_id =
            std::str::from_utf8(id_bytes).map_err(|_| EnvelopeFormatError::KeyIdEncoding)?;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);

        Self::new(key_id, nonce, ciphertext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_length_prefixed_id_then_nonce_then_ciphertext() {
        let envelope = CipherEnvelope::new("k1", [7u8; NONCE_LEN], vec![9u8; TAG_LEN + 3]).unwrap();
        let bytes = envelope.to_bytes();

        assert_eq!(bytes[0], 2);
        assert_eq!(&bytes[1..3], b"k1");
        assert_eq!(&bytes[3..15], &[7u8; NONCE_LEN]);
        assert_eq!(&bytes[15..], &[9u8; TAG_LEN + 3][..]);
        assert_eq!(bytes.len(), envelope.encoded_len());
        assert_eq!(envelope.plaintext_len(), 3);
    }

    #[test]
    fn decodes_what_it_encodes() {
        let envelope =
            CipherEnvelope::new("prod/transfer-key", [1u8; NONCE_LEN], vec![2u8; 40]).unwrap();
        assert_eq!(CipherEnvelope::from_bytes(&envelope.to_bytes()).unwrap(), envelope);
    }

    #[test]
    fn rejects_truncated_input() {
        assert_eq!(
            CipherEnvelope::from_bytes(&[]).unwrap_err(),
            EnvelopeFormatError::Truncated { needed: 1, actual: 0 }
        );

        let mut short = vec![2u8];
        short.extend_from_slice(b"k1");
        short.extend_from_slice(&[0u8; NONCE_LEN]);
        short.extend_from_slice(&[0u8; TAG_LEN - 1]);
        assert!(matches!(
            CipherEnvelope::from_bytes(&short),
            Err(EnvelopeFormatError::Truncated { .. })
        ));
    }

    #[test]
    fn rejects_zero_length_key_id() {
        let bytes = vec![0u8; 1 + NONCE_LEN + TAG_LEN];
        assert_eq!(
            CipherEnvelope::from_bytes(&bytes).unwrap_err(),
            EnvelopeFormatError::KeyIdLength(0)
        );
    }

    #[test]
    fn rejects_non_utf8_key_id() {
        let mut bytes = vec![1u8, 0xFF];
        bytes.extend_from_slice(&[0u8; NONCE_LEN + TAG_LEN]);
        assert_eq!(
            CipherEnvelope::from_bytes(&bytes).unwrap_err(),
            EnvelopeFormatError::KeyIdEncoding
        );
    }
}
