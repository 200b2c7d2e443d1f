use crate::{
    clients::{ClientError, ParameterStore},
    models::key::EncryptionKeyMaterial,
};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf, time::Duration};
use thiserror::Error;

pub const DEFAULT_PARAM_PREFIX: &str = "/hdfs-s3-transfer/";
pub const DEFAULT_SESSION_SECONDS: u64 = 900;
pub const DEFAULT_METRICS_NAMESPACE: &str = "HDFS/S3/Transfer";
/// Largest body accepted by a single non-multipart put.
pub const DEFAULT_MAX_OBJECT_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Process-level configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub param_file: PathBuf,
    pub param_prefix: String,
    pub source_path: Option<String>,
    pub principal: String,
    pub storage_dir: PathBuf,
    pub outbox: PathBuf,
    pub hadoop_bin: PathBuf,
    pub max_object_bytes: u64,
    pub metrics_namespace: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Encrypted, access-checked HDFS to object store transfer")]
pub struct Args {
    /// JSON parameter file (overrides HDFS_S3_TRANSFER_PARAM_FILE)
    #[arg(long)]
    pub param_file: Option<PathBuf>,

    /// Prefix under which transfer parameters live (overrides HDFS_S3_TRANSFER_PARAM_PREFIX)
    #[arg(long)]
    pub param_prefix: Option<String>,

    /// Source path; takes precedence over the `hdfs_path` parameter
    #[arg(long)]
    pub source_path: Option<String>,

    /// Invoking principal (overrides HDFS_S3_TRANSFER_PRINCIPAL, then USER)
    #[arg(long)]
    pub principal: Option<String>,

    /// Root directory of the local object store (overrides HDFS_S3_TRANSFER_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Notification outbox file (overrides HDFS_S3_TRANSFER_OUTBOX)
    #[arg(long)]
    pub outbox: Option<PathBuf>,

    /// Hadoop CLI binary (overrides HDFS_S3_TRANSFER_HADOOP_BIN)
    #[arg(long)]
    pub hadoop_bin: Option<PathBuf>,

    /// Upper bound on the uploaded body (overrides HDFS_S3_TRANSFER_MAX_OBJECT_BYTES)
    #[arg(long)]
    pub max_object_bytes: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), |name| env::var(name).ok())
    }

    /// CLI values win over environment values, which win over defaults.
    pub fn merge(args: Args, env_var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_path = |name: &str, default: &str| {
            PathBuf::from(env_var(name).unwrap_or_else(|| default.to_string()))
        };

        let env_max = match env_var("HDFS_S3_TRANSFER_MAX_OBJECT_BYTES") {
            Some(value) => value
                .parse::<u64>()
                .with_context(|| format!("parsing HDFS_S3_TRANSFER_MAX_OBJECT_BYTES value `{}`", value))?,
            None => DEFAULT_MAX_OBJECT_BYTES,
        };

        let principal = match args
            .principal
            .or_else(|| env_var("HDFS_S3_TRANSFER_PRINCIPAL"))
            .or_else(|| env_var("USER"))
        {
            Some(p) if !p.trim().is_empty() => p,
            _ => bail!("no principal given; pass --principal or set HDFS_S3_TRANSFER_PRINCIPAL"),
        };

        Ok(Self {
            param_file: args.param_file.unwrap_or_else(|| {
                env_path("HDFS_S3_TRANSFER_PARAM_FILE", "./config/parameters.json")
            }),
            param_prefix: args
                .param_prefix
                .or_else(|| env_var("HDFS_S3_TRANSFER_PARAM_PREFIX"))
                .unwrap_or_else(|| DEFAULT_PARAM_PREFIX.into()),
            source_path: args.source_path,
            principal,
            storage_dir: args
                .storage_dir
                .unwrap_or_else(|| env_path("HDFS_S3_TRANSFER_STORAGE_DIR", "./data/objects")),
            outbox: args.outbox.unwrap_or_else(|| {
                env_path("HDFS_S3_TRANSFER_OUTBOX", "./data/outbox/notifications.jsonl")
            }),
            hadoop_bin: args
                .hadoop_bin
                .unwrap_or_else(|| env_path("HDFS_S3_TRANSFER_HADOOP_BIN", "hadoop")),
            max_object_bytes: args.max_object_bytes.unwrap_or(env_max),
            metrics_namespace: env_var("HDFS_S3_TRANSFER_METRICS_NAMESPACE")
                .unwrap_or_else(|| DEFAULT_METRICS_NAMESPACE.into()),
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parameter `{0}` not found")]
    Missing(String),
    #[error("access to parameter `{0}` denied")]
    Denied(String),
    #[error("parameter `{name}` could not be read")]
    Unavailable {
        name: String,
        #[source]
        source: ClientError,
    },
    #[error("parameter `{name}` is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

/// Everything one transfer needs, resolved once by the caller and handed to
/// the orchestrator. Core logic never reads configuration on its own.
#[derive(Debug)]
pub struct TransferSettings {
    pub source_path: String,
    pub bucket: String,
    pub object_key: String,
    pub role_id: String,
    pub session_name: String,
    pub session_duration: Duration,
    pub notification_topic: String,
    pub key_material: EncryptionKeyMaterial,
}

impl TransferSettings {
    /// Resolve settings from `store`, reading `<prefix><name>` parameters.
    ///
    /// A non-blank `source_override` replaces the `hdfs_path` parameter,
    /// which then need not exist.
    pub async fn load(
        store: &dyn ParameterStore,
        prefix: &str,
        source_override: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let source_path = match source_override.filter(|path| !path.trim().is_empty()) {
            Some(path) => path.to_string(),
            None => required(store, prefix, "hdfs_path").await?,
        };
        let bucket = required(store, prefix, "s3_bucket_name").await?;
        let object_key = required(store, prefix, "s3_file_key").await?;
        let role_id = required(store, prefix, "role_arn").await?;
        let notification_topic = required(store, prefix, "sns_topic_arn").await?;

        let key_id = required(store, prefix, "encryption_key_id").await?;
        let encoded_key = required(store, prefix, "encryption_key").await?;
        let key_material = EncryptionKeyMaterial::from_base64(key_id, &encoded_key).map_err(
            |err| ConfigError::Invalid {
                name: format!("{prefix}encryption_key"),
                reason: err.to_string(),
            },
        )?;

        let session_duration = match optional(store, prefix, "session_duration_seconds").await? {
            Some(raw) => {
                let seconds = raw.trim().parse::<u64>().map_err(|err| ConfigError::Invalid {
                    name: format!("{prefix}session_duration_seconds"),
                    reason: err.to_string(),
                })?;
                Duration::from_secs(seconds)
            }
            None => Duration::from_secs(DEFAULT_SESSION_SECONDS),
        };

        let session_name = optional(store, prefix, "session_name")
            .await?
            .unwrap_or_else(|| "hdfs-s3-transfer".into());

        Ok(Self {
            source_path,
            bucket,
            object_key,
            role_id,
            session_name,
            session_duration,
            notification_topic,
            key_material,
        })
    }
}

async fn optional(
    store: &dyn ParameterStore,
    prefix: &str,
    name: &str,
) -> Result<Option<String>, ConfigError> {
    let full = format!("{prefix}{name}");
    match store.get_parameter(&full).await {
        Ok(value) => Ok(Some(value)),
        Err(ClientError::NotFound(_)) => Ok(None),
        Err(ClientError::PermissionDenied(_)) => Err(ConfigError::Denied(full)),
        Err(source) => Err(ConfigError::Unavailable { name: full, source }),
    }
}

async fn required(store: &dyn ParameterStore, prefix: &str, name: &str) -> Result<String, ConfigError> {
    match optional(store, prefix, name).await? {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(format!("{prefix}{name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClientResult, params::MemoryParameterStore};
    use async_trait::async_trait;
    use base64::{Engine as _, engine::general_purpose};
    use std::collections::HashMap;

    fn full_store() -> MemoryParameterStore {
        let key = general_purpose::STANDARD.encode([5u8; 32]);
        MemoryParameterStore::from_iter([
            ("/hdfs-s3-transfer/hdfs_path", "/data/in/a.csv"),
            ("/hdfs-s3-transfer/s3_bucket_name", "landing"),
            ("/hdfs-s3-transfer/s3_file_key", "in/a.csv.enc"),
            ("/hdfs-s3-transfer/role_arn", "arn:aws:iam::1:role/transfer"),
            ("/hdfs-s3-transfer/sns_topic_arn", "arn:aws:sns:eu-west-1:1:transfers"),
            ("/hdfs-s3-transfer/encryption_key_id", "transfer-key-v1"),
            ("/hdfs-s3-transfer/encryption_key", key.as_str()),
        ])
    }

    #[tokio::test]
    async fn loads_settings_with_defaults() {
        let settings = TransferSettings::load(&full_store(), DEFAULT_PARAM_PREFIX, None)
            .await
            .unwrap();
        assert_eq!(settings.bucket, "landing");
        assert_eq!(settings.object_key, "in/a.csv.enc");
        assert_eq!(settings.key_material.key_id(), "transfer-key-v1");
        assert_eq!(settings.session_duration, Duration::from_secs(DEFAULT_SESSION_SECONDS));
        assert_eq!(settings.session_name, "hdfs-s3-transfer");
    }

    #[tokio::test]
    async fn honours_session_duration_parameter() {
        let mut store = full_store();
        store.insert("/hdfs-s3-transfer/session_duration_seconds", "120");
        let settings = TransferSettings::load(&store, DEFAULT_PARAM_PREFIX, None).await.unwrap();
        assert_eq!(settings.session_duration, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn missing_parameter_is_reported_by_full_name() {
        let store = MemoryParameterStore::default();
        let err = TransferSettings::load(&store, DEFAULT_PARAM_PREFIX, None).await.unwrap_err();
        assert!(matches!(err, ConfigError::Missing(name) if name == "/hdfs-s3-transfer/hdfs_path"));
    }

    #[tokio::test]
    async fn source_override_makes_hdfs_path_optional() {
        let mut store = MemoryParameterStore::default();
        for (name, value) in [
            ("s3_bucket_name", "landing"),
            ("s3_file_key", "in/a.csv.enc"),
            ("role_arn", "arn:aws:iam::1:role/transfer"),
            ("sns_topic_arn", "arn:aws:sns:eu-west-1:1:transfers"),
            ("encryption_key_id", "transfer-key-v1"),
        ] {
            store.insert(format!("{DEFAULT_PARAM_PREFIX}{name}"), value);
        }
        store.insert(
            format!("{DEFAULT_PARAM_PREFIX}encryption_key"),
            general_purpose::STANDARD.encode([5u8; 32]),
        );

        let settings = TransferSettings::load(&store, DEFAULT_PARAM_PREFIX, Some("/data/cli.csv"))
            .await
            .unwrap();
        assert_eq!(settings.source_path, "/data/cli.csv");

        let err = TransferSettings::load(&store, DEFAULT_PARAM_PREFIX, Some("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(name) if name.ends_with("hdfs_path")));

        let settings = TransferSettings::load(&full_store(), DEFAULT_PARAM_PREFIX, Some("/data/cli.csv"))
            .await
            .unwrap();
        assert_eq!(settings.source_path, "/data/cli.csv");
    }

    #[tokio::test]
    async fn malformed_key_is_invalid() {
        let mut store = full_store();
        store.insert("/hdfs-s3-transfer/encryption_key", "c2hvcnQ=");
        let err = TransferSettings::load(&store, DEFAULT_PARAM_PREFIX, None).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    struct DenyingStore;

    #[async_trait]
    impl ParameterStore for DenyingStore {
        async fn get_parameter(&self, name: &str) -> ClientResult<String> {
            Err(ClientError::PermissionDenied(name.to_string()))
        }
    }

    #[tokio::test]
    async fn denied_parameter_is_access_denied() {
        let err = TransferSettings::load(&DenyingStore, DEFAULT_PARAM_PREFIX, None).await.unwrap_err();
        assert!(matches!(err, ConfigError::Denied(_)));
    }

    #[test]
    fn cli_overrides_environment() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HDFS_S3_TRANSFER_PRINCIPAL", "svc-transfer"),
            ("HDFS_S3_TRANSFER_STORAGE_DIR", "/srv/objects"),
            ("HDFS_S3_TRANSFER_MAX_OBJECT_BYTES", "1024"),
        ]);
        let args = Args::try_parse_from(["hdfs-s3-transfer", "--principal", "alice"]).unwrap();
        let cfg = AppConfig::merge(args, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.principal, "alice");
        assert_eq!(cfg.storage_dir, PathBuf::from("/srv/objects"));
        assert_eq!(cfg.max_object_bytes, 1024);
        assert_eq!(cfg.param_prefix, DEFAULT_PARAM_PREFIX);
    }

    #[test]
    fn principal_falls_back_to_user() {
        let args = Args::try_parse_from(["hdfs-s3-transfer"]).unwrap();
        let cfg = AppConfig::merge(args, |k| (k == "USER").then(|| "carol".to_string())).unwrap();
        assert_eq!(cfg.principal, "carol");
    }

    #[test]
    fn missing_principal_is_an_error() {
        let args = Args::try_parse_from(["hdfs-s3-transfer"]).unwrap();
        assert!(AppConfig::merge(args, |_| None).is_err());
    }

    #[test]
    fn bad_size_limit_is_an_error() {
        let args = Args::try_parse_from(["hdfs-s3-transfer", "--principal", "a"]).unwrap();
        let result = AppConfig::merge(args, |k| {
            (k == "HDFS_S3_TRANSFER_MAX_OBJECT_BYTES").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }
}
