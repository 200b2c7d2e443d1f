//! Delegated, short-lived credentials and the scope they are bound to.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::{collections::BTreeSet, fmt, time::Duration};
use zeroize::Zeroizing;

/// Object-level actions a credential set may be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ObjectAction {
    Put,
    Get,
}

impl ObjectAction {
    /// IAM-style action name, used in session policies and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAction::Put => "s3:PutObject",
            ObjectAction::Get => "s3:GetObject",
        }
    }
}

/// One bucket path plus the actions allowed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialScope {
    pub bucket: String,
    pub key: String,
    pub actions: BTreeSet<ObjectAction>,
}

impl CredentialScope {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        actions: impl IntoIterator<Item = ObjectAction>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            actions: actions.into_iter().collect(),
        }
    }

    /// `bucket/key` resource string.
    pub fn resource(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }

    pub fn permits(&self, bucket: &str, key: &str, action: ObjectAction) -> bool {
        self.bucket == bucket && self.key == key && self.actions.contains(&action)
    }

    /// True when every permission in `self` is also granted by `outer`.
    pub fn is_within(&self, outer: &CredentialScope) -> bool {
        self.bucket == outer.bucket
            && self.key == outer.key
            && self.actions.is_subset(&outer.actions)
    }
}

/// Short, non-reversible tag for an access key id, safe to log and to put
/// in error messages. The key id itself never leaves the credential types.
pub fn key_fingerprint(access_key_id: &str) -> String {
    let digest = Sha256::digest(access_key_id.as_bytes());
    digest[..6].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parameters of one role-assumption call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_id: String,
    pub session_name: String,
    pub scope: CredentialScope,
    pub duration: Duration,
}

/// Raw credential material as returned by the issuing service.
pub struct IssuedCredentials {
    pub access_key_id: Zeroizing<String>,
    pub secret_access_key: Zeroizing<String>,
    pub session_token: Zeroizing<String>,
    pub scope: CredentialScope,
    pub expires_at: DateTime<Utc>,
}

impl IssuedCredentials {
    pub fn fingerprint(&self) -> String {
        key_fingerprint(&self.access_key_id)
    }
}

impl fmt::Debug for IssuedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredentials")
            .field("key_fingerprint", &self.fingerprint())
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Credentials owned by one transfer for the lifetime of its destination
/// write. Not `Clone`, not serializable; secrets are wiped when dropped.
pub struct ScopedCredentials {
    access_key_id: Zeroizing<String>,
    secret_access_key: Zeroizing<String>,
    session_token: Zeroizing<String>,
    scope: CredentialScope,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl ScopedCredentials {
    pub fn from_issued(issued: IssuedCredentials, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_key_id: issued.access_key_id,
            secret_access_key: issued.secret_access_key,
            session_token: issued.session_token,
            scope: issued.scope,
            issued_at,
            expires_at: issued.expires_at,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn fingerprint(&self) -> String {
        key_fingerprint(&self.access_key_id)
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn scope(&self) -> &CredentialScope {
        &self.scope
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Expired at or after the expiry instant; a zero-lifetime credential is
    /// never usable.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn permits(&self, bucket: &str, key: &str, action: ObjectAction) -> bool {
        self.scope.permits(bucket, key, action)
    }
}

impl fmt::Debug for ScopedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCredentials")
            .field("key_fingerprint", &self.fingerprint())
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("scope", &self.scope)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
