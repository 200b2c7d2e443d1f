//! Exchange of the process identity for short-lived, narrowly scoped
//! credentials.

use crate::{
    clients::CredentialIssuer,
    errors::{TransferError, TransferResult},
    models::credentials::{AssumeRoleRequest, CredentialScope, ScopedCredentials},
};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

/// Shortest session the broker will request.
pub const MIN_SESSION: Duration = Duration::from_secs(1);
/// Longest session the broker will request; one transfer never needs more.
pub const MAX_SESSION: Duration = Duration::from_secs(3600);
/// Tolerated clock skew between us and the issuer when checking expiry.
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct CredentialBroker {
    issuer: Arc<dyn CredentialIssuer>,
    session_name: String,
}

impl CredentialBroker {
    pub fn new(issuer: Arc<dyn CredentialIssuer>, session_name: impl Into<String>) -> Self {
        Self {
            issuer,
            session_name: session_name.into(),
        }
    }

    /// Assume `role_id` for exactly `scope`, for at most `session_duration`
    /// (clamped to `MIN_SESSION..=MAX_SESSION`).
    ///
    /// Credentials broader than requested, or living longer than requested,
    /// are refused rather than used.
    pub async fn assume(
        &self,
        role_id: &str,
        scope: CredentialScope,
        session_duration: Duration,
    ) -> TransferResult<ScopedCredentials> {
        if role_id.trim().is_empty() {
            return Err(TransferError::credentials(role_id, "role identifier is empty"));
        }
        if scope.actions.is_empty() {
            return Err(TransferError::credentials(role_id, "no actions requested"));
        }

        let duration = session_duration.clamp(MIN_SESSION, MAX_SESSION);
        let request = AssumeRoleRequest {
            role_id: role_id.to_string(),
            session_name: self.session_name.clone(),
            scope,
            duration,
        };
        debug!(
            role = role_id,
            resource = %request.scope.resource(),
            seconds = duration.as_secs(),
            "requesting scoped credentials"
        );

        let requested_at = Utc::now();
        let issued = self.issuer.issue(&request).await.map_err(|source| {
            TransferError::CredentialExchangeFailed {
                role: role_id.to_string(),
                reason: "issuer refused or was unreachable".to_string(),
                source: Some(source),
            }
        })?;

        if !issued.scope.is_within(&request.scope) {
            return Err(TransferError::credentials(
                role_id,
                format!(
                    "issued scope on `{}` is broader than requested",
                    issued.scope.resource()
                ),
            ));
        }

        let latest = requested_at
            + chrono::Duration::seconds((duration + EXPIRY_SKEW).as_secs() as i64);
        if issued.expires_at > latest {
            return Err(TransferError::credentials(
                role_id,
                format!("issued expiry {} exceeds requested session", issued.expires_at),
            ));
        }

        info!(
            role = role_id,
            key_fingerprint = %issued.fingerprint(),
            expires_at = %issued.expires_at,
            "acquired scoped credentials"
        );
        Ok(ScopedCredentials::from_issued(issued, requested_at))
    }
}
