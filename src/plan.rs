//! Plan Builder
//!
//! Turns a diff into an ordered list of GRANT/REVOKE statements. Planning is pure:
//! nothing here touches a session.
//!
//! # Statement Order
//! Converge plans hold at most one GRANT followed by at most one REVOKE. The two
//! privilege lists are disjoint by construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::CurrentState;
use crate::diff::{removal_diff, PrivilegeDiff};
use crate::normalize::PrivilegeSet;
use crate::principal::Principal;

/// Statement verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Grant,
    Revoke,
}

/// A single GRANT or REVOKE naming one principal and one or more privileges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub action: Action,
    pub privileges: PrivilegeSet,
    pub principal: Principal,
}

impl Statement {
    #[must_use]
    pub fn grant(privileges: PrivilegeSet, principal: &Principal) -> Self {
        Self { action: Action::Grant, privileges, principal: principal.clone() }
    }

    #[must_use]
    pub fn revoke(privileges: PrivilegeSet, principal: &Principal) -> Self {
        Self { action: Action::Revoke, privileges, principal: principal.clone() }
    }

    /// Render the SQL text
    #[must_use]
    pub fn sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = self.privileges.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ");
        match self.action {
            Action::Grant => write!(f, "GRANT {list} TO {}", self.principal.name()),
            Action::Revoke => write!(f, "REVOKE {list} FROM {}", self.principal.name()),
        }
    }
}

/// Ordered statements for one reconciliation call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub statements: Vec<Statement>,
}

impl Plan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// SQL text of every statement, in order
    #[must_use]
    pub fn sql(&self) -> Vec<String> {
        self.statements.iter().map(Statement::sql).collect()
    }
}

/// Converge mode: grant the additions, then revoke the removals
#[must_use]
pub fn converge_plan(principal: &Principal, diff: PrivilegeDiff) -> Plan {
    let mut statements = Vec::with_capacity(2);
    if !diff.to_add.is_empty() {
        statements.push(Statement::grant(diff.to_add, principal));
    }
    if !diff.to_remove.is_empty() {
        statements.push(Statement::revoke(diff.to_remove, principal));
    }
    Plan { statements }
}

/// Absent mode: revoke the requested privileges that are actually held
///
/// An empty plan means the principal holds none of them.
#[must_use]
pub fn removal_plan(principal: &Principal, requested: &PrivilegeSet, current: &CurrentState) -> Plan {
    single_revoke(principal, removal_diff(requested, current))
}

/// REMOVEALL mode: revoke every role and system privilege held
#[must_use]
pub fn remove_all_plan(principal: &Principal, current: &CurrentState) -> Plan {
    single_revoke(principal, current.all())
}

fn single_revoke(principal: &Principal, privileges: PrivilegeSet) -> Plan {
    if privileges.is_empty() {
        Plan::default()
    } else {
        Plan { statements: vec![Statement::revoke(privileges, principal)] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_diff;
    use crate::normalize::privilege_set;
    use crate::principal::PrincipalKind;
    use pretty_assertions::assert_eq;

    fn scott() -> Principal {
        Principal::new(PrincipalKind::Schema, "scott").unwrap()
    }

    #[test]
    fn test_statement_rendering() {
        let grant = Statement::grant(privilege_set(["RESOURCE", "CONNECT"]), &scott());
        assert_eq!(grant.sql(), "GRANT CONNECT, RESOURCE TO SCOTT");

        let revoke = Statement::revoke(privilege_set(["CREATE SESSION"]), &scott());
        assert_eq!(revoke.sql(), "REVOKE CREATE SESSION FROM SCOTT");
    }

    #[test]
    fn test_converge_plan_grant_before_revoke() {
        let diff = PrivilegeDiff {
            to_add: privilege_set(["CREATE TABLE"]),
            to_remove: privilege_set(["CREATE VIEW"]),
        };
        let plan = converge_plan(&scott(), diff);
        assert_eq!(
            plan.sql(),
            vec!["GRANT CREATE TABLE TO SCOTT", "REVOKE CREATE VIEW FROM SCOTT"]
        );
    }

    #[test]
    fn test_converge_plan_empty_diff() {
        let plan = converge_plan(&scott(), PrivilegeDiff::default());
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }

    #[test]
    fn test_bundle_scenario_single_grant() {
        let desired = privilege_set(["CONNECT", "RESOURCE"]);
        let diff =
            compute_diff(&desired, &PrivilegeSet::new(), &privilege_set(["CREATE SESSION"]));
        let plan = converge_plan(&scott(), diff);
        assert_eq!(plan.sql(), vec!["GRANT CONNECT, RESOURCE TO SCOTT"]);
    }

    #[test]
    fn test_removal_plan_partial_match() {
        let current = CurrentState {
            roles: PrivilegeSet::new(),
            system_privileges: privilege_set(["CREATE SESSION"]),
        };
        let requested = privilege_set(["CREATE SESSION", "CREATE TABLE"]);
        let plan = removal_plan(&scott(), &requested, &current);
        assert_eq!(plan.sql(), vec!["REVOKE CREATE SESSION FROM SCOTT"]);

        let plan = removal_plan(&scott(), &privilege_set(["DBA"]), &current);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_remove_all_plan() {
        let current = CurrentState {
            roles: privilege_set(["DBA"]),
            system_privileges: privilege_set(["CREATE SESSION"]),
        };
        let plan = remove_all_plan(&scott(), &current);
        assert_eq!(plan.sql(), vec!["REVOKE CREATE SESSION, DBA FROM SCOTT"]);

        assert!(remove_all_plan(&scott(), &CurrentState::default()).is_empty());
    }
}
