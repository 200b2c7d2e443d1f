//! Parameter stores: a JSON file on disk and an in-memory map.

use super::{ClientError, ClientResult, ParameterStore};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::debug;

/// Parameters loaded once from a JSON object of `"full/name": "value"`.
#[derive(Debug, Clone)]
pub struct FileParameterStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileParameterStore {
    pub async fn load(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = fs::read_to_string(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => ClientError::NotFound(path.display().to_string()),
            ErrorKind::PermissionDenied => ClientError::PermissionDenied(path.display().to_string()),
            _ => ClientError::Unavailable(format!("reading {}: {}", path.display(), err)),
        })?;
        let values: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|err| {
            ClientError::InvalidRequest(format!("parsing {}: {}", path.display(), err))
        })?;
        debug!("loaded {} parameters from {}", values.len(), path.display());
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ParameterStore for FileParameterStore {
    async fn get_parameter(&self, name: &str) -> ClientResult<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(name.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryParameterStore {
    values: BTreeMap<String, String>,
}

impl MemoryParameterStore {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryParameterStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn get_parameter(&self, name: &str) -> ClientResult<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(name.to_string()))
    }
}
