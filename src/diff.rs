//! Diff Engine
//!
//! Computes what must be granted and revoked to move a principal from its current
//! privileges to the desired set.
//!
//! # Bundle Privileges
//! Granting `DBA`, `RESOURCE` or `CONNECT` implies broad system privileges. When the
//! desired set names any of them, the principal's system privileges are never
//! revoked; only role grants are diffed for removal. A desired system privilege that
//! is already held directly is still not granted again.

use serde::{Deserialize, Serialize};

use crate::catalog::CurrentState;
use crate::normalize::PrivilegeSet;

/// Roles whose request suppresses system-privilege diffing
pub const BUNDLE_PRIVILEGES: [&str; 3] = ["DBA", "RESOURCE", "CONNECT"];

/// Grants and revokes needed to converge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeDiff {
    pub to_add: PrivilegeSet,
    pub to_remove: PrivilegeSet,
}

impl PrivilegeDiff {
    /// Nothing to add and nothing to remove
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Whether the desired set requests any bundle privilege
#[must_use]
pub fn requests_bundle(desired: &PrivilegeSet) -> bool {
    desired.iter().any(|privilege| BUNDLE_PRIVILEGES.contains(&privilege.as_str()))
}

/// Symmetric diff between desired and current state (converge mode)
///
/// `to_add = desired - held`, `to_remove = compared - desired`. `held` is every
/// current role and system privilege; `compared` omits the system privileges
/// whenever a bundle privilege is desired.
#[must_use]
pub fn compute_diff(
    desired: &PrivilegeSet,
    current_roles: &PrivilegeSet,
    current_system_privileges: &PrivilegeSet,
) -> PrivilegeDiff {
    let compared = if requests_bundle(desired) {
        current_roles.clone()
    } else {
        current_roles.union(current_system_privileges).cloned().collect()
    };

    PrivilegeDiff {
        to_add: desired
            .iter()
            .filter(|p| !current_roles.contains(p) && !current_system_privileges.contains(p))
            .cloned()
            .collect(),
        to_remove: compared.difference(desired).cloned().collect(),
    }
}

/// Removal-only diff (absent mode)
///
/// Only privileges that are both requested for removal and actually held are revoked;
/// the bundle exception does not apply.
#[must_use]
pub fn removal_diff(requested: &PrivilegeSet, current: &CurrentState) -> PrivilegeSet {
    requested.intersection(&current.all()).cloned().collect()
}
