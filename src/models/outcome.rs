//! Pipeline stages and the terminal record of a transfer.

use crate::{errors::TransferError, services::integrity::Checksum};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, time::Duration};
use uuid::Uuid;

/// Linear states of one transfer. `Failed` is carried separately in
/// [`TransferStatus`] and can be entered from any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TransferStage {
    Initiated,
    AccessChecked,
    Read,
    Encrypted,
    CredentialsAcquired,
    Uploaded,
    Verified,
    Completed,
}

impl TransferStage {
    /// The only state reachable from `self` on success.
    pub fn next(self) -> Option<TransferStage> {
        use TransferStage::*;
        match self {
            Initiated => Some(AccessChecked),
            AccessChecked => Some(Read),
            Read => Some(Encrypted),
            Encrypted => Some(CredentialsAcquired),
            CredentialsAcquired => Some(Uploaded),
            Uploaded => Some(Verified),
            Verified => Some(Completed),
            Completed => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use TransferStage::*;
        match self {
            Initiated => "initiated",
            AccessChecked => "access_checked",
            Read => "read",
            Encrypted => "encrypted",
            CredentialsAcquired => "credentials_acquired",
            Uploaded => "uploaded",
            Verified => "verified",
            Completed => "completed",
        }
    }
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum TransferStatus {
    Succeeded,
    /// `last_stage` is the last state reached before the failure.
    Failed {
        last_stage: TransferStage,
        error: TransferError,
    },
}

/// Terminal record handed to telemetry and notification, then dropped.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub transfer_id: Uuid,
    pub source_path: String,
    pub status: TransferStatus,
    /// SHA-256 of the source plaintext, once it was read.
    pub checksum: Option<Checksum>,
    /// Plaintext size of the source file, once it was read.
    pub source_bytes: u64,
    /// Size of the stored envelope, once the store acknowledged it.
    pub bytes_transferred: u64,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TransferStatus::Succeeded)
    }

    pub fn error(&self) -> Option<&TransferError> {
        match &self.status {
            TransferStatus::Succeeded => None,
            TransferStatus::Failed { error, .. } => Some(error),
        }
    }

    /// `Success` / `Failed`, the metric dimension value.
    pub fn status_label(&self) -> &'static str {
        if self.is_success() { "Success" } else { "Failed" }
    }
}
