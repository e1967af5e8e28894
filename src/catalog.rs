//! Catalog Reader and Principal Validator
//!
//! Reads current privilege state from the data dictionary. Every read is a single
//! read-only query scoped to one principal by a case-insensitive exact match
//! (`UPPER(:name)` on the server side). Nothing is cached between calls.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::check_read_only;
use crate::engine::{bounded, PrivilegeSession};
use crate::error::{PrivsyncError, Result};
use crate::normalize::{normalize_name, Privilege, PrivilegeSet};
use crate::principal::{Principal, PrincipalKind};

/// Existence check for schemas
pub const SCHEMA_EXISTS_QUERY: &str =
    "SELECT username FROM dba_users WHERE username = UPPER(:name)";

/// Existence check for roles
pub const ROLE_EXISTS_QUERY: &str = "SELECT role FROM dba_roles WHERE role = UPPER(:name)";

/// Roles granted to a principal
pub const ROLE_GRANTS_QUERY: &str =
    "SELECT DISTINCT granted_role FROM dba_role_privs WHERE grantee = UPPER(:name)";

/// System privileges granted to a principal
pub const SYSTEM_PRIVILEGES_QUERY: &str =
    "SELECT DISTINCT privilege FROM dba_sys_privs WHERE grantee = UPPER(:name)";

/// Result of a principal existence check
///
/// Absence is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalLookup {
    /// The principal is present in the dictionary
    Found,
    /// The principal is absent; `reason` is ready to show to the caller
    Missing { reason: String },
}

impl PrincipalLookup {
    #[must_use]
    pub const fn exists(&self) -> bool {
        matches!(self, Self::Found)
    }
}

/// Current privilege state of a principal, read from two independent sources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentState {
    /// Roles granted to the principal
    pub roles: PrivilegeSet,
    /// System privileges granted directly to the principal
    pub system_privileges: PrivilegeSet,
}

impl CurrentState {
    /// Union of both sources
    #[must_use]
    pub fn all(&self) -> PrivilegeSet {
        self.roles.union(&self.system_privileges).cloned().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.system_privileges.is_empty()
    }
}

/// Read-only view of the data dictionary over an open session
pub struct CatalogReader<'a, S> {
    session: &'a mut S,
    timeout_ms: Option<u64>,
}

impl<'a, S: PrivilegeSession> CatalogReader<'a, S> {
    /// Create a reader over a session
    pub fn new(session: &'a mut S) -> Self {
        Self { session, timeout_ms: None }
    }

    /// Bound every query by a time limit
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Check whether a schema or role exists
    ///
    /// Fails with a validation error when `name` is empty.
    pub async fn principal_exists(
        &mut self,
        kind: PrincipalKind,
        name: &str,
    ) -> Result<PrincipalLookup> {
        let name = normalize_name(name)?;
        let query = match kind {
            PrincipalKind::Schema => SCHEMA_EXISTS_QUERY,
            PrincipalKind::Role => ROLE_EXISTS_QUERY,
        };

        let rows = self.fetch(query, &name).await?;
        if rows.is_empty() {
            debug!(%kind, name = %name, "principal not found");
            Ok(PrincipalLookup::Missing { reason: format!("{} {name} does not exist", kind.title()) })
        } else {
            Ok(PrincipalLookup::Found)
        }
    }

    /// Roles currently granted to the principal
    pub async fn current_role_grants(&mut self, principal: &Principal) -> Result<PrivilegeSet> {
        self.fetch_set(ROLE_GRANTS_QUERY, principal.name()).await
    }

    /// System privileges currently granted to the principal
    pub async fn current_system_privileges(
        &mut self,
        principal: &Principal,
    ) -> Result<PrivilegeSet> {
        self.fetch_set(SYSTEM_PRIVILEGES_QUERY, principal.name()).await
    }

    /// Read both sources
    pub async fn current_state(&mut self, principal: &Principal) -> Result<CurrentState> {
        let roles = self.current_role_grants(principal).await?;
        let system_privileges = self.current_system_privileges(principal).await?;
        debug!(
            principal = %principal,
            roles = roles.len(),
            system_privileges = system_privileges.len(),
            "read current privilege state"
        );
        Ok(CurrentState { roles, system_privileges })
    }

    async fn fetch_set(&mut self, query: &str, name: &str) -> Result<PrivilegeSet> {
        let rows = self.fetch(query, name).await?;
        Ok(rows.iter().map(|value| Privilege::from_catalog(value)).collect())
    }

    async fn fetch(&mut self, query: &str, name: &str) -> Result<Vec<String>> {
        check_read_only(query)?;
        debug!(query, name, "catalog query");
        bounded(self.session.query_strings(query, &[(":name", name)]), self.timeout_ms, query)
            .await?
            .map_err(|source| PrivsyncError::catalog_query(query, source))
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::engine::sqlite::SqliteSession;
    use crate::normalize::privilege_set;
    use pretty_assertions::assert_eq;

    fn seeded_session() -> SqliteSession {
        let mut session = SqliteSession::in_memory().unwrap();
        session.init_catalog().unwrap();
        session.create_user("SCOTT").unwrap();
        session.create_role("APP_ROLE").unwrap();
        session
    }

    #[tokio::test]
    async fn test_principal_exists_by_kind() {
        let mut session = seeded_session();
        let mut reader = CatalogReader::new(&mut session);

        assert!(reader.principal_exists(PrincipalKind::Schema, "scott").await.unwrap().exists());
        assert!(reader.principal_exists(PrincipalKind::Role, "App_Role").await.unwrap().exists());

        // A role is not a schema and vice versa
        let lookup = reader.principal_exists(PrincipalKind::Schema, "app_role").await.unwrap();
        assert_eq!(
            lookup,
            PrincipalLookup::Missing { reason: "Schema APP_ROLE does not exist".to_string() }
        );
        assert!(!reader.principal_exists(PrincipalKind::Role, "scott").await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_principal_exists_empty_name() {
        let mut session = seeded_session();
        let mut reader = CatalogReader::new(&mut session);
        let err = reader.principal_exists(PrincipalKind::Schema, "  ").await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_current_state_reads_both_sources() {
        let mut session = seeded_session();
        session.execute_sql("GRANT CONNECT, CREATE SESSION, CREATE TABLE TO SCOTT").unwrap();

        let principal = Principal::new(PrincipalKind::Schema, "scott").unwrap();
        let mut reader = CatalogReader::new(&mut session);
        let state = reader.current_state(&principal).await.unwrap();

        assert_eq!(state.roles, privilege_set(["CONNECT"]));
        assert_eq!(state.system_privileges, privilege_set(["CREATE SESSION", "CREATE TABLE"]));
        assert_eq!(state.all(), privilege_set(["CONNECT", "CREATE SESSION", "CREATE TABLE"]));
    }

    #[tokio::test]
    async fn test_catalog_query_error_carries_query() {
        // No dictionary tables: every query fails
        let mut session = SqliteSession::in_memory().unwrap();
        let principal = Principal::new(PrincipalKind::Role, "app_role").unwrap();
        let mut reader = CatalogReader::new(&mut session);

        let err = reader.current_role_grants(&principal).await.unwrap_err();
        match err {
            PrivsyncError::CatalogQuery { query, source } => {
                assert_eq!(query, ROLE_GRANTS_QUERY);
                assert!(source.message.contains("dba_role_privs"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
