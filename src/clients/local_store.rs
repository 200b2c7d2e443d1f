//! S3-like put/get against a local directory tree.
//!
//! Buckets are existing directories beneath `base_path`; payloads are
//! sharded beneath `base_path/{bucket}/{shard}/{shard}/{key}`. Every request
//! is authorized against the caller's scoped credentials before any I/O.

use super::{ClientError, ClientResult, ObjectStore, PutAck, local_sts::SessionLedger};
use crate::models::credentials::{ObjectAction, ScopedCredentials};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    /// Base directory on disk where buckets live.
    base_path: PathBuf,
    /// Largest body a single put may carry.
    max_object_bytes: u64,
    /// Sessions this store honours.
    sessions: Arc<SessionLedger>,
}

impl LocalObjectStore {
    pub fn new(
        base_path: impl Into<PathBuf>,
        max_object_bytes: u64,
        sessions: Arc<SessionLedger>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            max_object_bytes,
            sessions,
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    fn ensure_key_safe(&self, key: &str) -> ClientResult<()> {
        let invalid = |reason: &str| Err(ClientError::InvalidRequest(format!("object key {reason}")));
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return invalid("must be between 1 and 1024 bytes");
        }
        if key.starts_with('/') || key.contains("..") {
            return invalid("must be relative and must not contain `..`");
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return invalid("contains control characters or backslashes");
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// Enforces S3-like naming rules:
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    fn ensure_bucket_name_safe(&self, name: &str) -> ClientResult<()> {
        let invalid = |reason: &str| {
            Err(ClientError::InvalidRequest(format!(
                "bucket `{name}` invalid: {reason}"
            )))
        };

        let len = name.len();
        if len < BUCKET_NAME_MIN_LEN || len > BUCKET_NAME_MAX_LEN {
            return invalid("must be between 3 and 63 characters");
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return invalid("allowed characters are lowercase letters, digits, dots, and hyphens");
        }
        if name.starts_with('.')
            || name.ends_with('.')
            || name.starts_with('-')
            || name.ends_with('-')
        {
            return invalid("must start and end with a lowercase letter or digit");
        }
        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return invalid("cannot contain consecutive dots or dot-hyphen combinations");
        }
        if is_ipv4_like(name) {
            return invalid("must not be formatted like an IP address");
        }
        Ok(())
    }

    /// Reject unknown, altered, or expired credentials and anything outside
    /// their scope.
    fn authorize(
        &self,
        credentials: &ScopedCredentials,
        bucket: &str,
        key: &str,
        action: ObjectAction,
    ) -> ClientResult<()> {
        self.sessions.verify(credentials)?;
        if credentials.is_expired_at(Utc::now()) {
            return Err(ClientError::CredentialRejected(format!(
                "session {} expired at {}",
                credentials.fingerprint(),
                credentials.expires_at()
            )));
        }
        if !credentials.permits(bucket, key, action) {
            return Err(ClientError::CredentialRejected(format!(
                "{} on {bucket}/{key} is outside the session scope",
                action.as_str()
            )));
        }
        Ok(())
    }

    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// Two-level shard identifiers from MD5(bucket/key), as lowercase hex.
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket_name, key);
        let mut path = self.bucket_root(bucket_name);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn ensure_bucket_exists(&self, bucket: &str) -> ClientResult<()> {
        match fs::metadata(self.bucket_root(bucket)).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ClientError::NotFound(format!("bucket `{bucket}`"))),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(ClientError::NotFound(format!("bucket `{bucket}`")))
            }
            Err(err) => Err(io_error(err)),
        }
    }

    /// Write `body` to a temp file, fsync, then rename over the final path.
    /// Readers never observe a partial object.
    async fn write_atomically(&self, file_path: &Path, body: &[u8]) -> io::Result<()> {
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(body).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, file_path).await
        }
        .await;

        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        credentials: &ScopedCredentials,
    ) -> ClientResult<PutAck> {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_key_safe(key)?;
        self.authorize(credentials, bucket, key, ObjectAction::Put)?;

        let size_bytes = body.len() as u64;
        if size_bytes > self.max_object_bytes {
            return Err(ClientError::SizeLimitExceeded {
                size: size_bytes,
                limit: self.max_object_bytes,
            });
        }
        self.ensure_bucket_exists(bucket).await?;

        let file_path = self.object_path(bucket, key);
        self.write_atomically(&file_path, &body)
            .await
            .map_err(|err| {
                warn!("failed to store {}: {}", file_path.display(), err);
                io_error(err)
            })?;
        debug!("stored {} bytes at {}", size_bytes, file_path.display());

        Ok(PutAck {
            etag: format!("{:x}", md5::compute(&body)),
            checksum: format!("{:x}", Sha256::digest(&body)),
            size_bytes,
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        credentials: &ScopedCredentials,
    ) -> ClientResult<Bytes> {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_key_safe(key)?;
        self.authorize(credentials, bucket, key, ObjectAction::Get)?;

        let file_path = self.object_path(bucket, key);
        match fs::read(&file_path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ClientError::NotFound(format!(
                "object `{key}` in bucket `{bucket}`"
            ))),
            Err(err) => Err(io_error(err)),
        }
    }
}

fn io_error(err: io::Error) -> ClientError {
    match err.kind() {
        ErrorKind::PermissionDenied => ClientError::PermissionDenied(err.to_string()),
        ErrorKind::NotFound => ClientError::NotFound(err.to_string()),
        _ => ClientError::Unavailable(err.to_string()),
    }
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts.iter().all(|segment| {
        !segment.is_empty()
            && segment.len() <= 3
            && segment.chars().all(|c| c.is_ascii_digit())
            && segment.parse::<u8>().is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credentials::{CredentialScope, IssuedCredentials};
    use zeroize::Zeroizing;

    fn credentials(
        sessions: &SessionLedger,
        bucket: &str,
        key: &str,
        actions: &[ObjectAction],
        ttl_seconds: i64,
    ) -> ScopedCredentials {
        let now = Utc::now();
        let issued = IssuedCredentials {
            access_key_id: Zeroizing::new(format!("ASIA{}", Uuid::new_v4().simple())),
            secret_access_key: Zeroizing::new("s".into()),
            session_token: Zeroizing::new("t".into()),
            scope: CredentialScope::new(bucket, key, actions.iter().copied()),
            expires_at: now + chrono::Duration::seconds(ttl_seconds),
        };
        sessions.record(&issued).unwrap();
        ScopedCredentials::from_issued(issued, now)
    }

    fn store_with_bucket(limit: u64) -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("landing")).unwrap();
        let store = LocalObjectStore::new(dir.path(), limit, Arc::new(SessionLedger::default()));
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_get_returns_same_bytes_and_ack() {
        let (_dir, store) = store_with_bucket(1024);
        let creds = credentials(&store.sessions, "landing", "in/a.enc", &[ObjectAction::Put, ObjectAction::Get], 60);

        let ack = store
            .put_object("landing", "in/a.enc", Bytes::from_static(b"hello"), &creds)
            .await
            .unwrap();
        assert_eq!(ack.size_bytes, 5);
        assert_eq!(ack.etag, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(
            ack.checksum,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        let body = store.get_object("landing", "in/a.enc", &creds).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn objects_are_sharded_and_leave_no_temp_files() {
        let (dir, store) = store_with_bucket(1024);
        let creds = credentials(&store.sessions, "landing", "a.enc", &[ObjectAction::Put], 60);
        store
            .put_object("landing", "a.enc", Bytes::from_static(b"x"), &creds)
            .await
            .unwrap();

        let path = store.object_path("landing", "a.enc");
        assert!(path.starts_with(dir.path().join("landing")));
        assert!(path.exists());
        let siblings: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(siblings, vec!["a.enc".to_string()]);
    }

    #[tokio::test]
    async fn expired_credentials_are_rejected() {
        let (_dir, store) = store_with_bucket(1024);
        let creds = credentials(&store.sessions, "landing", "a.enc", &[ObjectAction::Put], 0);
        let err = store
            .put_object("landing", "a.enc", Bytes::from_static(b"x"), &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::CredentialRejected(_)));
        let message = err.to_string();
        assert!(message.contains(&creds.fingerprint()));
        assert!(!message.contains(creds.access_key_id()));
        assert!(!message.contains("ASIA"));
    }

    #[tokio::test]
    async fn out_of_scope_requests_are_rejected() {
        let (_dir, store) = store_with_bucket(1024);
        let put_only = credentials(&store.sessions, "landing", "a.enc", &[ObjectAction::Put], 60);

        let other_key = store
            .put_object("landing", "b.enc", Bytes::from_static(b"x"), &put_only)
            .await
            .unwrap_err();
        assert!(matches!(other_key, ClientError::CredentialRejected(_)));

        let read = store.get_object("landing", "a.enc", &put_only).await.unwrap_err();
        assert!(matches!(read, ClientError::CredentialRejected(_)));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let (_dir, store) = store_with_bucket(4);
        let creds = credentials(&store.sessions, "landing", "a.enc", &[ObjectAction::Put], 60);
        let err = store
            .put_object("landing", "a.enc", Bytes::from_static(b"hello"), &creds)
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::SizeLimitExceeded { size: 5, limit: 4 });
    }

    #[tokio::test]
    async fn missing_bucket_and_object_are_not_found() {
        let (_dir, store) = store_with_bucket(1024);
        let creds = credentials(&store.sessions, "archive", "a.enc", &[ObjectAction::Put], 60);
        assert!(matches!(
            store
                .put_object("archive", "a.enc", Bytes::from_static(b"x"), &creds)
                .await,
            Err(ClientError::NotFound(_))
        ));

        let creds = credentials(&store.sessions, "landing", "a.enc", &[ObjectAction::Get], 60);
        assert!(matches!(
            store.get_object("landing", "a.enc", &creds).await,
            Err(ClientError::NotFound(_))
        ));
    }

    #[test]
    fn validates_names_and_keys() {
        let store = LocalObjectStore::new("/tmp/unused", 1, Arc::default());
        assert!(store.ensure_bucket_name_safe("landing-zone.eu").is_ok());
        assert!(store.ensure_bucket_name_safe("ab").is_err());
        assert!(store.ensure_bucket_name_safe("Landing").is_err());
        assert!(store.ensure_bucket_name_safe("-landing").is_err());
        assert!(store.ensure_bucket_name_safe("a..b").is_err());
        assert!(store.ensure_bucket_name_safe("192.168.1.1").is_err());

        assert!(store.ensure_key_safe("in/2024/a.enc").is_ok());
        assert!(store.ensure_key_safe("").is_err());
        assert!(store.ensure_key_safe("/etc/passwd").is_err());
        assert!(store.ensure_key_safe("in/../../x").is_err());
        assert!(store.ensure_key_safe("a\\b").is_err());
    }

    #[tokio::test]
    async fn sessions_not_minted_for_this_store_are_rejected() {
        let (_dir, store) = store_with_bucket(1024);
        let elsewhere = SessionLedger::default();
        let creds = credentials(&elsewhere, "landing", "a.enc", &[ObjectAction::Put], 60);
        let err = store
            .put_object("landing", "a.enc", Bytes::from_static(b"x"), &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::CredentialRejected(_)));
        assert!(!err.to_string().contains("ASIA"));
    }
}
