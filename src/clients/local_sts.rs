//! In-process credential issuer for single-host deployments and tests.
//!
//! Trusts a fixed allow-list of role identifiers and mints random session
//! credentials bound to the requested scope and lifetime. Every minted
//! session is recorded in a [`SessionLedger`] that the local object store
//! consults, so only credentials this issuer handed out are honoured.

use super::{ClientError, ClientResult, CredentialIssuer};
use crate::models::credentials::{
    AssumeRoleRequest, IssuedCredentials, ScopedCredentials, key_fingerprint,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::info;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Digests of live sessions, keyed by a digest of the access key id.
/// Raw credential material is never stored.
#[derive(Debug, Default)]
pub struct SessionLedger {
    sessions: Mutex<HashMap<[u8; 32], SessionRecord>>,
}

#[derive(Debug)]
struct SessionRecord {
    material: [u8; 32],
    expires_at: DateTime<Utc>,
}

impl SessionLedger {
    pub(crate) fn record(&self, issued: &IssuedCredentials) -> ClientResult<()> {
        let now = Utc::now();
        let mut sessions = self.lock()?;
        sessions.retain(|_, record| record.expires_at > now);
        sessions.insert(
            Sha256::digest(issued.access_key_id.as_bytes()).into(),
            SessionRecord {
                material: material_digest(&issued.secret_access_key, &issued.session_token),
                expires_at: issued.expires_at,
            },
        );
        Ok(())
    }

    /// Accept `credentials` only if this ledger minted them, unchanged.
    pub fn verify(&self, credentials: &ScopedCredentials) -> ClientResult<()> {
        let id: [u8; 32] = Sha256::digest(credentials.access_key_id().as_bytes()).into();
        let sessions = self.lock()?;
        let rejected = |why: &str| -> ClientResult<()> {
            Err(ClientError::CredentialRejected(format!(
                "session {} {why}",
                credentials.fingerprint()
            )))
        };
        match sessions.get(&id) {
            None => rejected("was not issued here"),
            Some(record)
                if record.material
                    != material_digest(
                        credentials.secret_access_key(),
                        credentials.session_token(),
                    ) =>
            {
                rejected("does not match the issued secret")
            }
            Some(record) if record.expires_at != credentials.expires_at() => {
                rejected("carries an altered expiry")
            }
            Some(_) => Ok(()),
        }
    }

    fn lock(&self) -> ClientResult<std::sync::MutexGuard<'_, HashMap<[u8; 32], SessionRecord>>> {
        self.sessions
            .lock()
            .map_err(|_| ClientError::Unavailable("session ledger is poisoned".into()))
    }
}

fn material_digest(secret: &str, token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update([0u8]);
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

#[derive(Debug, Clone)]
pub struct LocalCredentialIssuer {
    allowed_roles: BTreeSet<String>,
    max_duration: Duration,
    ledger: Arc<SessionLedger>,
}

impl LocalCredentialIssuer {
    pub fn new(allowed_roles: impl IntoIterator<Item = String>, max_duration: Duration) -> Self {
        Self {
            allowed_roles: allowed_roles.into_iter().collect(),
            max_duration,
            ledger: Arc::new(SessionLedger::default()),
        }
    }

    /// Ledger of sessions minted here; hand it to the store that honours them.
    pub fn ledger(&self) -> Arc<SessionLedger> {
        self.ledger.clone()
    }
}

#[async_trait]
impl CredentialIssuer for LocalCredentialIssuer {
    async fn issue(&self, request: &AssumeRoleRequest) -> ClientResult<IssuedCredentials> {
        if !self.allowed_roles.contains(&request.role_id) {
            return Err(ClientError::PermissionDenied(format!(
                "role `{}` may not be assumed",
                request.role_id
            )));
        }
        if request.duration > self.max_duration {
            return Err(ClientError::InvalidRequest(format!(
                "requested {}s exceeds the {}s maximum",
                request.duration.as_secs(),
                self.max_duration.as_secs()
            )));
        }

        let mut key_bytes = [0u8; 8];
        OsRng.fill_bytes(&mut key_bytes);
        let mut secret = Zeroizing::new([0u8; 30]);
        OsRng.fill_bytes(&mut secret[..]);

        let access_key_id = format!(
            "ASIA{}",
            key_bytes
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<String>()
        );
        let expires_at = Utc::now() + chrono::Duration::seconds(request.duration.as_secs() as i64);

        info!(
            role = %request.role_id,
            session = %request.session_name,
            resource = %request.scope.resource(),
            key_fingerprint = %key_fingerprint(&access_key_id),
            "issued local session credentials"
        );

        let issued = IssuedCredentials {
            access_key_id: Zeroizing::new(access_key_id),
            secret_access_key: Zeroizing::new(general_purpose::STANDARD.encode(&secret[..])),
            session_token: Zeroizing::new(format!("{}.{}", request.session_name, Uuid::new_v4())),
            scope: request.scope.clone(),
            expires_at,
        };
        self.ledger.record(&issued)?;
        Ok(issued)
    }
}
