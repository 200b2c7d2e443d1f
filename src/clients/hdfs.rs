//! HDFS access through the `hadoop fs` command line.

use super::{ClientError, ClientResult, SourceFilesystem};
use async_trait::async_trait;
use bytes::Bytes;
use std::{io::ErrorKind, path::PathBuf, process::Stdio};
use tokio::process::Command;
use tracing::debug;

/// Shells out to `hadoop fs -stat %g` and `hadoop fs -cat`.
#[derive(Debug, Clone)]
pub struct HadoopCli {
    binary: PathBuf,
}

impl HadoopCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn fs(&self, args: &[&str], path: &str) -> ClientResult<Vec<u8>> {
        debug!("running {} fs {} {}", self.binary.display(), args.join(" "), path);
        let output = Command::new(&self.binary)
            .arg("fs")
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => ClientError::Unavailable(format!(
                    "hadoop binary `{}` not found",
                    self.binary.display()
                )),
                _ => ClientError::Connection(err.to_string()),
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(classify_failure(path, &String::from_utf8_lossy(&output.stderr)))
        }
    }
}

#[async_trait]
impl SourceFilesystem for HadoopCli {
    async fn read_file(&self, path: &str) -> ClientResult<Bytes> {
        self.fs(&["-cat"], path).await.map(Bytes::from)
    }

    async fn owner_group(&self, path: &str) -> ClientResult<String> {
        let stdout = self.fs(&["-stat", "%g"], path).await?;
        let group = String::from_utf8_lossy(&stdout).trim().to_string();
        if group.is_empty() {
            return Err(ClientError::Unavailable(format!("no owning group reported for `{path}`")));
        }
        Ok(group)
    }
}

/// Map `hadoop fs` stderr onto a client error kind.
fn classify_failure(path: &str, stderr: &str) -> ClientError {
    let message = stderr.trim();
    if message.contains("No such file or directory") {
        ClientError::NotFound(path.to_string())
    } else if message.contains("Permission denied") || message.contains("AccessControlException") {
        ClientError::PermissionDenied(path.to_string())
    } else if message.contains("Connection refused")
        || message.contains("UnknownHostException")
        || message.contains("ConnectException")
    {
        ClientError::Connection(message.to_string())
    } else {
        ClientError::Unavailable(message.to_string())
    }
}
