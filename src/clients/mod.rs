//! Ports to the external systems a transfer touches, plus the concrete
//! adapters the binary wires in.
//!
//! The core (`services`) only ever sees the traits in this module. Every
//! trait is object-safe and injected as `Arc<dyn Trait>` so tests can swap in
//! fakes with fixed group mappings, canned payloads, or scripted failures.

use crate::models::{
    credentials::{AssumeRoleRequest, IssuedCredentials, ScopedCredentials},
    notification::{Dimension, Notification},
};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

pub mod hdfs;
pub mod local_store;
pub mod local_sts;
pub mod notify;
pub mod os_groups;
pub mod params;
pub mod telemetry;

/// Failure reported by any external collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("`{0}` not found")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("connection failure: {0}")]
    Connection(String),
    #[error("credentials rejected: {0}")]
    CredentialRejected(String),
    #[error("object of {size} bytes exceeds limit of {limit} bytes")]
    SizeLimitExceeded { size: u64, limit: u64 },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Acknowledgement returned by the object store after a successful put.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PutAck {
    /// MD5 of the stored body, S3 style.
    pub etag: String,
    /// SHA-256 of the stored body, lowercase hex.
    pub checksum: String,
    pub size_bytes: u64,
}

/// Source side of the transfer (HDFS in production).
#[async_trait]
pub trait SourceFilesystem: Send + Sync {
    async fn read_file(&self, path: &str) -> ClientResult<Bytes>;

    /// Name of the single group owning `path`.
    async fn owner_group(&self, path: &str) -> ClientResult<String>;
}

/// Group membership as seen by the local operating environment.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn principal_groups(&self, principal: &str) -> ClientResult<BTreeSet<String>>;
}

/// Destination object store. A put is a single atomic write of the full body.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        credentials: &ScopedCredentials,
    ) -> ClientResult<PutAck>;

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        credentials: &ScopedCredentials,
    ) -> ClientResult<Bytes>;
}

/// Key/value settings store (SSM parameter store analogue).
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_parameter(&self, name: &str) -> ClientResult<String>;
}

/// Delegated-credential issuing service (STS analogue).
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self, request: &AssumeRoleRequest) -> ClientResult<IssuedCredentials>;
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn emit_metric(&self, name: &str, value: f64, dimensions: &[Dimension])
    -> ClientResult<()>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, topic: &str, notification: &Notification) -> ClientResult<()>;
}
