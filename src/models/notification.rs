//! Telemetry dimensions and operator notifications.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;

/// How loudly a notification should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// Possible tampering or corruption; page someone.
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric dimension (`Name=Value`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Standard transfer report body.
    pub fn transfer(
        subject: impl Into<String>,
        file_path: &str,
        status: &str,
        details: &str,
        severity: Severity,
    ) -> Self {
        let timestamp = Utc::now();
        let message = format!(
            "HDFS to S3 Transfer {status}\nFile: {file_path}\nTimestamp: {}\nDetails: {details}",
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        Self {
            subject: subject.into(),
            message,
            severity,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_message_carries_path_status_and_details() {
        let n = Notification::transfer(
            "Transfer Successful",
            "/data/in/a.csv",
            "SUCCESS",
            "Transferred in 0.42 seconds",
            Severity::Info,
        );
        assert!(n.message.starts_with("HDFS to S3 Transfer SUCCESS"));
        assert!(n.message.contains("File: /data/in/a.csv"));
        assert!(n.message.contains("Details: Transferred in 0.42 seconds"));
    }

    #[test]
    fn severities_order_by_loudness() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"CRITICAL\"");
    }
}
