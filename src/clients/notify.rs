//! Notifications appended to a JSON-lines outbox file.
//!
//! A relay (SNS forwarder, mail bridge, ...) tails the file and delivers
//! each record to the named topic.

use super::{ClientError, ClientResult, NotificationSink};
use crate::models::notification::{Notification, Severity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    path: PathBuf,
}

#[derive(Serialize)]
struct OutboxRecord<'a> {
    topic: &'a str,
    subject: &'a str,
    severity: Severity,
    message: &'a str,
    timestamp: DateTime<Utc>,
}

impl OutboxNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl NotificationSink for OutboxNotifier {
    async fn publish(&self, topic: &str, notification: &Notification) -> ClientResult<()> {
        let record = OutboxRecord {
            topic,
            subject: &notification.subject,
            severity: notification.severity,
            message: &notification.message,
            timestamp: notification.timestamp,
        };
        let mut line = serde_json::to_vec(&record)
            .map_err(|err| ClientError::InvalidRequest(err.to_string()))?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| ClientError::Unavailable(err.to_string()))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| ClientError::Unavailable(err.to_string()))?;
        file.write_all(&line)
            .await
            .map_err(|err| ClientError::Unavailable(err.to_string()))?;
        file.flush()
            .await
            .map_err(|err| ClientError::Unavailable(err.to_string()))?;

        debug!(topic, subject = %notification.subject, "queued notification");
        Ok(())
    }
}
