//! Content checksums compared across the transfer boundary.
//!
//! SHA-256 guards against accidental corruption only; tampering is the
//! cipher's authentication tag's job.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Wrap a hex digest reported by another party (e.g. an object store ack).
    pub fn from_hex(hex: impl AsRef<str>) -> Self {
        Self(hex.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn checksum(bytes: &[u8]) -> Checksum {
    Checksum(format!("{:x}", Sha256::digest(bytes)))
}

pub fn verify(expected: &Checksum, actual: &Checksum) -> bool {
    expected == actual
}
