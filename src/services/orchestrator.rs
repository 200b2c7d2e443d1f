//! Runs one file through the transfer pipeline:
//!
//! ```text
//! Initiated -> AccessChecked -> Read -> Encrypted -> CredentialsAcquired
//!           -> Uploaded -> Verified -> Completed
//! ```
//!
//! Any step may fail into the terminal `Failed(reason)` state. Stages run
//! strictly one after another; nothing is retried here. Whatever the result,
//! metrics and a notification are attempted once the run ends, and their
//! failures never change the outcome.

use crate::{
    clients::{
        ClientError, CredentialIssuer, GroupDirectory, NotificationSink, ObjectStore,
        SourceFilesystem, TelemetrySink,
    },
    config::TransferSettings,
    errors::{TransferError, TransferResult},
    models::{
        credentials::{CredentialScope, ObjectAction, ScopedCredentials},
        envelope::CipherEnvelope,
        notification::{Dimension, Notification, Severity},
        outcome::{TransferOutcome, TransferStage, TransferStatus},
        request::TransferRequest,
    },
    services::{
        access_guard::AccessGuard,
        cipher_box,
        credential_broker::CredentialBroker,
        integrity::{self, Checksum},
    },
};
use bytes::Bytes;
use chrono::Utc;
use std::{error::Error as _, sync::Arc, time::Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// External systems one transfer talks to. Each orchestrator gets its own
/// set; nothing here is shared mutable state between transfers.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn SourceFilesystem>,
    pub groups: Arc<dyn GroupDirectory>,
    pub store: Arc<dyn ObjectStore>,
    pub issuer: Arc<dyn CredentialIssuer>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// Runs exactly one transfer; [`run`](Self::run) consumes it.
pub struct TransferOrchestrator {
    settings: TransferSettings,
    guard: AccessGuard,
    broker: CredentialBroker,
    source: Arc<dyn SourceFilesystem>,
    store: Arc<dyn ObjectStore>,
    telemetry: Arc<dyn TelemetrySink>,
    notifier: Arc<dyn NotificationSink>,
    transfer_id: Uuid,
    stage: TransferStage,
    checksum: Option<Checksum>,
    source_bytes: u64,
    bytes_transferred: u64,
}

impl TransferOrchestrator {
    pub fn new(settings: TransferSettings, collaborators: Collaborators) -> Self {
        let guard = AccessGuard::new(collaborators.source.clone(), collaborators.groups);
        let broker = CredentialBroker::new(collaborators.issuer, settings.session_name.clone());
        Self {
            settings,
            guard,
            broker,
            source: collaborators.source,
            store: collaborators.store,
            telemetry: collaborators.telemetry,
            notifier: collaborators.notifier,
            transfer_id: Uuid::new_v4(),
            stage: TransferStage::Initiated,
            checksum: None,
            source_bytes: 0,
            bytes_transferred: 0,
        }
    }

    pub fn transfer_id(&self) -> Uuid {
        self.transfer_id
    }

    /// Run the pipeline to `Completed` or `Failed`, report, and return the
    /// terminal outcome.
    pub async fn run(mut self, request: TransferRequest) -> TransferOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(transfer_id = %self.transfer_id, request = %request, "transfer initiated");

        let status = match self.execute(&request).await {
            Ok(()) => TransferStatus::Succeeded,
            Err(err) => {
                if err.severity() == Severity::Critical {
                    error!(
                        transfer_id = %self.transfer_id,
                        kind = %err.kind(),
                        stage = %self.stage,
                        error = %describe(&err),
                        "transfer failed; payload may be corrupted or tampered with"
                    );
                } else {
                    error!(
                        transfer_id = %self.transfer_id,
                        kind = %err.kind(),
                        stage = %self.stage,
                        error = %describe(&err),
                        "transfer failed"
                    );
                }
                TransferStatus::Failed {
                    last_stage: self.stage,
                    error: err,
                }
            }
        };

        let outcome = TransferOutcome {
            transfer_id: self.transfer_id,
            source_path: request.source_path().to_string(),
            status,
            checksum: self.checksum.take(),
            source_bytes: self.source_bytes,
            bytes_transferred: self.bytes_transferred,
            started_at,
            duration: clock.elapsed(),
        };
        self.report(&outcome).await;
        outcome
    }

    async fn execute(&mut self, request: &TransferRequest) -> TransferResult<()> {
        let (bucket, key) = (request.bucket(), request.object_key());

        self.guard
            .check(request.principal(), request.source_path())
            .await?;
        self.advance(TransferStage::AccessChecked);

        let plaintext = self
            .source
            .read_file(request.source_path())
            .await
            .map_err(|source| TransferError::ResourceUnavailable {
                operation: "read",
                path: request.source_path().to_string(),
                source,
            })?;
        let source_checksum = integrity::checksum(&plaintext);
        self.checksum = Some(source_checksum.clone());
        self.source_bytes = plaintext.len() as u64;
        self.advance(TransferStage::Read);

        let envelope = cipher_box::encrypt(&plaintext, &self.settings.key_material)?;
        drop(plaintext);
        let body = Bytes::from(envelope.to_bytes());
        let body_checksum = integrity::checksum(&body);
        self.advance(TransferStage::Encrypted);

        let scope = CredentialScope::new(bucket, key, [ObjectAction::Put, ObjectAction::Get]);
        let credentials = self
            .broker
            .assume(&self.settings.role_id, scope, self.settings.session_duration)
            .await?;
        self.advance(TransferStage::CredentialsAcquired);

        self.ensure_live(&credentials)?;
        let ack = self
            .store
            .put_object(bucket, key, body, &credentials)
            .await
            .map_err(|source| upload_failed(bucket, key, source))?;
        self.bytes_transferred = ack.size_bytes;
        self.advance(TransferStage::Uploaded);

        let acknowledged = Checksum::from_hex(&ack.checksum);
        if !integrity::verify(&body_checksum, &acknowledged) {
            return Err(TransferError::IntegrityMismatch {
                boundary: "acknowledged upload",
                expected: body_checksum.to_string(),
                actual: acknowledged.to_string(),
            });
        }

        self.ensure_live(&credentials)?;
        let stored = self
            .store
            .get_object(bucket, key, &credentials)
            .await
            .map_err(|source| upload_failed(bucket, key, source))?;
        drop(credentials);

        let stored = CipherEnvelope::from_bytes(&stored).map_err(|err| {
            TransferError::DecryptionFailed {
                reason: format!("stored object is not a valid envelope: {err}"),
            }
        })?;
        let restored = cipher_box::decrypt(&stored, &self.settings.key_material)?;
        let restored_checksum = integrity::checksum(&restored);
        if !integrity::verify(&source_checksum, &restored_checksum) {
            return Err(TransferError::IntegrityMismatch {
                boundary: "decrypted read-back",
                expected: source_checksum.to_string(),
                actual: restored_checksum.to_string(),
            });
        }
        self.advance(TransferStage::Verified);

        self.advance(TransferStage::Completed);
        Ok(())
    }

    fn advance(&mut self, next: TransferStage) {
        debug_assert_eq!(self.stage.next(), Some(next), "stages advance one at a time");
        self.stage = next;
        info!(transfer_id = %self.transfer_id, stage = %next, "stage reached");
    }

    /// Using credentials past their expiry is a bug, not a retryable state.
    fn ensure_live(&self, credentials: &ScopedCredentials) -> TransferResult<()> {
        let now = Utc::now();
        if credentials.is_expired_at(now) {
            warn!(
                transfer_id = %self.transfer_id,
                key_fingerprint = %credentials.fingerprint(),
                issued_at = %credentials.issued_at(),
                expires_at = %credentials.expires_at(),
                "refusing to use expired credentials"
            );
            return Err(TransferError::credentials(
                &self.settings.role_id,
                format!("credentials expired at {} before use", credentials.expires_at()),
            ));
        }
        Ok(())
    }

    /// Best-effort metrics and notification for the terminal outcome.
    async fn report(&self, outcome: &TransferOutcome) {
        let mut dimensions = vec![Dimension::new("Status", outcome.status_label())];
        if let Some(err) = outcome.error() {
            dimensions.push(Dimension::new("FailureKind", err.kind().as_str()));
        }

        let metrics = [
            ("FileSizeBytes", outcome.source_bytes as f64),
            ("TransferDuration", outcome.duration.as_secs_f64()),
            ("TransferCount", 1.0),
        ];
        for (name, value) in metrics {
            if let Err(err) = self.telemetry.emit_metric(name, value, &dimensions).await {
                warn!(transfer_id = %self.transfer_id, metric = name, error = %err, "failed to emit metric");
            }
        }

        let notification = match &outcome.status {
            TransferStatus::Succeeded => Notification::transfer(
                "Transfer Successful",
                &outcome.source_path,
                "SUCCESS",
                &format!(
                    "Transferred {} bytes in {:.2} seconds (transfer {}, sha256 {})",
                    outcome.source_bytes,
                    outcome.duration.as_secs_f64(),
                    outcome.transfer_id,
                    outcome
                        .checksum
                        .as_ref()
                        .map(Checksum::as_str)
                        .unwrap_or("-"),
                ),
                Severity::Info,
            ),
            TransferStatus::Failed { last_stage, error } => {
                let severity = error.severity();
                let subject = if severity == Severity::Critical {
                    "[CRITICAL] Transfer Failed"
                } else {
                    "Transfer Failed"
                };
                Notification::transfer(
                    subject,
                    &outcome.source_path,
                    "FAILED",
                    &format!(
                        "{} after stage {} (transfer {}): {}",
                        error.kind(),
                        last_stage,
                        outcome.transfer_id,
                        describe(error)
                    ),
                    severity,
                )
            }
        };

        if let Err(err) = self
            .notifier
            .publish(&self.settings.notification_topic, &notification)
            .await
        {
            warn!(transfer_id = %self.transfer_id, error = %err, "failed to publish notification");
        }
    }
}

fn upload_failed(bucket: &str, key: &str, source: ClientError) -> TransferError {
    TransferError::UploadFailed {
        bucket: bucket.to_string(),
        key: key.to_string(),
        source,
    }
}

/// Error message followed by its source, if any.
fn describe(err: &TransferError) -> String {
    match err.source() {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}
