//! Group-based read authorization for source files.

use crate::{
    clients::{ClientError, GroupDirectory, SourceFilesystem},
    errors::{TransferError, TransferResult},
    models::access::AccessDecision,
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, warn};

/// Decides whether a principal may read a source file.
///
/// Only read-only metadata queries are made; the file body is never touched.
#[derive(Clone)]
pub struct AccessGuard {
    source: Arc<dyn SourceFilesystem>,
    groups: Arc<dyn GroupDirectory>,
}

impl AccessGuard {
    pub fn new(source: Arc<dyn SourceFilesystem>, groups: Arc<dyn GroupDirectory>) -> Self {
        Self { source, groups }
    }

    /// Look up both group facts and build a decision without enforcing it.
    ///
    /// Fails with `ResourceUnavailable` when either lookup fails or the file
    /// reports no owning group. An unknown principal has no groups.
    pub async fn evaluate(&self, principal: &str, source_path: &str) -> TransferResult<AccessDecision> {
        let owner_group = self
            .source
            .owner_group(source_path)
            .await
            .map_err(|source| TransferError::ResourceUnavailable {
                operation: "stat owning group of",
                path: source_path.to_string(),
                source,
            })?;
        let owner_group = owner_group.trim().to_string();
        if owner_group.is_empty() {
            return Err(TransferError::ResourceUnavailable {
                operation: "stat owning group of",
                path: source_path.to_string(),
                source: ClientError::Unavailable("filesystem reported no owning group".into()),
            });
        }

        // A principal the directory does not know belongs to no group and is
        // refused, not treated as an outage.
        let principal_groups = match self.groups.principal_groups(principal).await {
            Ok(groups) => groups,
            Err(ClientError::NotFound(_)) => {
                debug!(principal, "principal unknown to group directory");
                BTreeSet::new()
            }
            Err(source) => {
                return Err(TransferError::ResourceUnavailable {
                    operation: "resolve principal groups for",
                    path: source_path.to_string(),
                    source,
                });
            }
        };

        debug!(
            principal,
            owner_group = %owner_group,
            groups = ?principal_groups,
            "evaluated source access"
        );
        Ok(AccessDecision::evaluate(owner_group, principal_groups))
    }

    /// Like [`evaluate`](Self::evaluate), but a refused decision becomes
    /// `AccessDenied`.
    pub async fn check(&self, principal: &str, source_path: &str) -> TransferResult<AccessDecision> {
        let decision = self.evaluate(principal, source_path).await?;
        if decision.granted {
            Ok(decision)
        } else {
            warn!(
                principal,
                path = source_path,
                owner_group = %decision.owner_group,
                "access denied"
            );
            Err(TransferError::AccessDenied {
                principal: principal.to_string(),
                owner_group: decision.owner_group,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientResult;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    struct FixedSource {
        owner: ClientResult<String>,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl SourceFilesystem for FixedSource {
        async fn read_file(&self, _path: &str) -> ClientResult<Bytes> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(b"unused"))
        }

        async fn owner_group(&self, _path: &str) -> ClientResult<String> {
            self.owner.clone()
        }
    }

    struct FixedGroups(BTreeMap<String, BTreeSet<String>>);

    #[async_trait]
    impl GroupDirectory for FixedGroups {
        async fn principal_groups(&self, principal: &str) -> ClientResult<BTreeSet<String>> {
            self.0
                .get(principal)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(principal.to_string()))
        }
    }

    fn guard(owner: ClientResult<String>) -> (AccessGuard, Arc<FixedSource>) {
        let source = Arc::new(FixedSource {
            owner,
            reads: AtomicUsize::new(0),
        });
        let mut groups = BTreeMap::new();
        groups.insert("alice".to_string(), BTreeSet::from(["eng".to_string()]));
        groups.insert(
            "bob".to_string(),
            BTreeSet::from(["sales".to_string(), "users".to_string()]),
        );
        let guard = AccessGuard::new(source.clone(), Arc::new(FixedGroups(groups)));
        (guard, source)
    }

    #[tokio::test]
    async fn grants_member_of_owning_group() {
        let (guard, source) = guard(Ok("eng\n".into()));
        let decision = guard.check("alice", "/data/a.csv").await.unwrap();
        assert!(decision.granted);
        assert_eq!(decision.owner_group, "eng");
        assert_eq!(source.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn denies_non_member_without_reading() {
        let (guard, source) = guard(Ok("eng".into()));
        let err = guard.check("bob", "/data/a.csv").await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::AccessDenied { ref principal, ref owner_group }
                if principal == "bob" && owner_group == "eng"
        ));
        assert_eq!(source.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn evaluate_reports_refusal_without_error() {
        let (guard, _) = guard(Ok("eng".into()));
        let decision = guard.evaluate("bob", "/data/a.csv").await.unwrap();
        assert!(!decision.granted);
        assert!(decision.principal_groups.contains("sales"));
    }

    #[tokio::test]
    async fn metadata_failure_is_resource_unavailable() {
        let (guard, _) = guard(Err(ClientError::Connection("namenode down".into())));
        let err = guard.check("alice", "/data/a.csv").await.unwrap_err();
        assert!(matches!(err, TransferError::ResourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn blank_owner_group_is_resource_unavailable() {
        let (guard, _) = guard(Ok("   ".into()));
        let err = guard.check("alice", "/data/a.csv").await.unwrap_err();
        assert!(matches!(err, TransferError::ResourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn unknown_principal_is_denied() {
        let (guard, source) = guard(Ok("eng".into()));
        let err = guard.check("mallory", "/data/a.csv").await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::AccessDenied { ref principal, .. } if principal == "mallory"
        ));
        assert_eq!(source.reads.load(Ordering::SeqCst), 0);
    }

    struct UnreachableGroups;

    #[async_trait]
    impl GroupDirectory for UnreachableGroups {
        async fn principal_groups(&self, _principal: &str) -> ClientResult<BTreeSet<String>> {
            Err(ClientError::Unavailable("`id` not found".into()))
        }
    }

    #[tokio::test]
    async fn group_directory_outage_is_resource_unavailable() {
        let source = Arc::new(FixedSource {
            owner: Ok("eng".into()),
            reads: AtomicUsize::new(0),
        });
        let guard = AccessGuard::new(source, Arc::new(UnreachableGroups));
        let err = guard.check("alice", "/data/a.csv").await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::ResourceUnavailable { source: ClientError::Unavailable(_), .. }
        ));
    }
}
