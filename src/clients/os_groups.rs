//! Group membership from the local operating environment via `id -Gn`.

use super::{ClientError, ClientResult, GroupDirectory};
use async_trait::async_trait;
use std::{collections::BTreeSet, io::ErrorKind, path::PathBuf, process::Stdio};
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct OsGroupDirectory {
    id_binary: PathBuf,
}

impl Default for OsGroupDirectory {
    fn default() -> Self {
        Self {
            id_binary: PathBuf::from("id"),
        }
    }
}

impl OsGroupDirectory {
    pub fn with_binary(id_binary: impl Into<PathBuf>) -> Self {
        Self {
            id_binary: id_binary.into(),
        }
    }
}

#[async_trait]
impl GroupDirectory for OsGroupDirectory {
    async fn principal_groups(&self, principal: &str) -> ClientResult<BTreeSet<String>> {
        if principal.is_empty() || principal.starts_with('-') {
            return Err(ClientError::InvalidRequest(format!(
                "invalid principal `{principal}`"
            )));
        }

        let output = Command::new(&self.id_binary)
            .arg("-Gn")
            .arg(principal)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => ClientError::Unavailable(format!(
                    "`{}` not found",
                    self.id_binary.display()
                )),
                _ => ClientError::Unavailable(err.to_string()),
            })?;

        if !output.status.success() {
            return Err(classify_failure(
                principal,
                &String::from_utf8_lossy(&output.stderr),
            ));
        }
        Ok(parse_groups(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Unknown users are `NotFound` (GNU `id` says "no such user", busybox
/// "unknown user"); anything else is an outage.
fn classify_failure(principal: &str, stderr: &str) -> ClientError {
    let lowered = stderr.to_ascii_lowercase();
    if lowered.contains("no such user") || lowered.contains("unknown user") {
        ClientError::NotFound(principal.to_string())
    } else {
        ClientError::Unavailable(stderr.trim().to_string())
    }
}

fn parse_groups(stdout: &str) -> BTreeSet<String> {
    stdout.split_whitespace().map(str::to_string).collect()
}
