//! Failure taxonomy of the transfer pipeline.
//!
//! Every variant is terminal for the current transfer and maps 1:1 onto the
//! `Failed(reason)` state. Callers get the specific kind back so tooling can
//! tell authorization problems from network trouble from tampering.

use crate::{clients::ClientError, models::notification::Severity};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TransferError {
    #[error("principal `{principal}` is not a member of owning group `{owner_group}`")]
    AccessDenied {
        principal: String,
        owner_group: String,
    },
    #[error("source unavailable while trying to {operation} `{path}`")]
    ResourceUnavailable {
        operation: &'static str,
        path: String,
        #[source]
        source: ClientError,
    },
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },
    #[error("credential exchange for role `{role}` failed: {reason}")]
    CredentialExchangeFailed {
        role: String,
        reason: String,
        #[source]
        source: Option<ClientError>,
    },
    #[error("upload to `{bucket}/{key}` failed")]
    UploadFailed {
        bucket: String,
        key: String,
        #[source]
        source: ClientError,
    },
    #[error("integrity mismatch on {boundary}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        boundary: &'static str,
        expected: String,
        actual: String,
    },
}

pub type TransferResult<T> = Result<T, TransferError>;

/// Field-free discriminant of [`TransferError`], used for metric dimensions
/// and exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    AccessDenied,
    ResourceUnavailable,
    EncryptionFailed,
    DecryptionFailed,
    CredentialExchangeFailed,
    UploadFailed,
    IntegrityMismatch,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::AccessDenied => "AccessDenied",
            FailureKind::ResourceUnavailable => "ResourceUnavailable",
            FailureKind::EncryptionFailed => "EncryptionFailed",
            FailureKind::DecryptionFailed => "DecryptionFailed",
            FailureKind::CredentialExchangeFailed => "CredentialExchangeFailed",
            FailureKind::UploadFailed => "UploadFailed",
            FailureKind::IntegrityMismatch => "IntegrityMismatch",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransferError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TransferError::AccessDenied { .. } => FailureKind::AccessDenied,
            TransferError::ResourceUnavailable { .. } => FailureKind::ResourceUnavailable,
            TransferError::EncryptionFailed { .. } => FailureKind::EncryptionFailed,
            TransferError::DecryptionFailed { .. } => FailureKind::DecryptionFailed,
            TransferError::CredentialExchangeFailed { .. } => {
                FailureKind::CredentialExchangeFailed
            }
            TransferError::UploadFailed { .. } => FailureKind::UploadFailed,
            TransferError::IntegrityMismatch { .. } => FailureKind::IntegrityMismatch,
        }
    }

    /// Integrity and authentication failures may mean tampering and are
    /// always reported at the highest level.
    pub fn severity(&self) -> Severity {
        match self.kind() {
            FailureKind::IntegrityMismatch | FailureKind::DecryptionFailed => Severity::Critical,
            FailureKind::AccessDenied => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub(crate) fn credentials(role: &str, reason: impl Into<String>) -> Self {
        TransferError::CredentialExchangeFailed {
            role: role.to_string(),
            reason: reason.into(),
            source: None,
        }
    }
}
