//! One transfer operation, as handed to the orchestrator.

use serde::Serialize;
use std::fmt;

/// Identifies a single file move. Immutable once built; consumed by exactly
/// one orchestrator run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    source_path: String,
    bucket: String,
    object_key: String,
    principal: String,
}

impl TransferRequest {
    pub fn new(
        source_path: impl Into<String>,
        bucket: impl Into<String>,
        object_key: impl Into<String>,
        principal: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            bucket: bucket.into(),
            object_key: object_key.into(),
            principal: principal.into(),
        }
    }

    /// Path on the source filesystem, opaque beyond filesystem semantics.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    /// Identity of the invoking user, checked against the file's owning group.
    pub fn principal(&self) -> &str {
        &self.principal
    }
}

impl fmt::Display for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}/{} (as {})",
            self.source_path, self.bucket, self.object_key, self.principal
        )
    }
}
