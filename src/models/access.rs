//! Result of the group-membership read check.

use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of one access evaluation. Built fresh per request and never
/// cached, since group membership can change between transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub granted: bool,
    /// The single group owning the source file.
    pub owner_group: String,
    /// Groups the principal belongs to in the local environment.
    pub principal_groups: BTreeSet<String>,
}

impl AccessDecision {
    /// Grants iff the principal's groups contain the owning group.
    ///
    /// This is a plain set intersection with `{owner_group}`, not an ACL
    /// evaluation: per-user grants and multiple owning groups are ignored.
    pub fn evaluate(owner_group: impl Into<String>, principal_groups: BTreeSet<String>) -> Self {
        let owner_group = owner_group.into();
        let granted = !owner_group.is_empty() && principal_groups.contains(&owner_group);
        Self {
            granted,
            owner_group,
            principal_groups,
        }
    }
}
