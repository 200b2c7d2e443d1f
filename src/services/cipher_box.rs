//! AES-256-GCM encryption of transfer payloads.
//!
//! A fresh 96-bit nonce is drawn from the OS RNG for every call and stored
//! in the envelope. The key identifier is bound as associated data, so an
//! envelope relabelled with another identifier fails authentication.

use crate::{
    errors::{TransferError, TransferResult},
    models::{
        envelope::{CipherEnvelope, NONCE_LEN},
        key::EncryptionKeyMaterial,
    },
};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};

/// Encrypt `plaintext` under `key`.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKeyMaterial) -> TransferResult<CipherEnvelope> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(nonce.as_slice());
    encrypt_with_nonce(plaintext, key, nonce_bytes)
}

fn encrypt_with_nonce(
    plaintext: &[u8],
    key: &EncryptionKeyMaterial,
    nonce: [u8; NONCE_LEN],
) -> TransferResult<CipherEnvelope> {
    let cipher = Aes256Gcm::new(key.key_bytes().into());
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: key.key_id().as_bytes(),
            },
        )
        .map_err(|_| TransferError::EncryptionFailed {
            reason: "cipher rejected the input".to_string(),
        })?;

    CipherEnvelope::new(key.key_id(), nonce, ciphertext).map_err(|err| {
        TransferError::EncryptionFailed {
            reason: err.to_string(),
        }
    })
}

/// Decrypt `envelope`, verifying both the key identifier and the tag.
pub fn decrypt(envelope: &CipherEnvelope, key: &EncryptionKeyMaterial) -> TransferResult<Vec<u8>> {
    if envelope.key_id() != key.key_id() {
        return Err(TransferError::DecryptionFailed {
            reason: format!(
                "key identifier mismatch: envelope has `{}`, key is `{}`",
                envelope.key_id(),
                key.key_id()
            ),
        });
    }

    let cipher = Aes256Gcm::new(key.key_bytes().into());
    cipher
        .decrypt(
            Nonce::from_slice(envelope.nonce()),
            Payload {
                msg: envelope.ciphertext(),
                aad: envelope.key_id().as_bytes(),
            },
        )
        .map_err(|_| TransferError::DecryptionFailed {
            reason: "authentication failed".to_string(),
        })
}
