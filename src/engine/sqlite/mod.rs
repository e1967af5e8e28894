//! `SQLite` Privilege Dictionary Implementation
//!
//! This module implements the `PrivilegeSession` trait on top of a `SQLite` file that
//! stores an Oracle-style data dictionary.
//!
//! # Dictionary Tables
//! - `dba_users (username)` and `dba_roles (role)`: principals
//! - `system_privilege_map (name)`: grantable system privileges
//! - `dba_role_privs (grantee, granted_role)`: role grants
//! - `dba_sys_privs (grantee, privilege)`: system privilege grants
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver, no async needed)
//! - GRANT/REVOKE are interpreted against the dictionary tables; every item is
//!   resolved before anything is written, so a failing statement changes nothing
//! - Errors mirror Oracle codes (`ORA-01917`, `ORA-01919`, `ORA-01951`, `ORA-01952`)
//! - BEGIN/COMMIT/ROLLBACK are real `SQLite` transactions
//! - Timeouts enforced via `busy_timeout`

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, ToSql};
use std::time::Duration;
use tracing::debug;

use crate::capability::{classify_statement, preprocess_sql, StatementKind};
use crate::engine::{Bind, ConnectionConfig, DriverError, DriverResult, PrivilegeSession};
use crate::error::{PrivsyncError, Result};

const DICTIONARY_DDL: &str = "
    CREATE TABLE IF NOT EXISTS dba_users (username TEXT PRIMARY KEY);
    CREATE TABLE IF NOT EXISTS dba_roles (role TEXT PRIMARY KEY);
    CREATE TABLE IF NOT EXISTS system_privilege_map (name TEXT PRIMARY KEY);
    CREATE TABLE IF NOT EXISTS dba_role_privs (
        grantee TEXT NOT NULL,
        granted_role TEXT NOT NULL,
        PRIMARY KEY (grantee, granted_role)
    );
    CREATE TABLE IF NOT EXISTS dba_sys_privs (
        grantee TEXT NOT NULL,
        privilege TEXT NOT NULL,
        PRIMARY KEY (grantee, privilege)
    );
";

/// Roles present in every fresh dictionary
pub const PREDEFINED_ROLES: &[&str] = &["CONNECT", "RESOURCE", "DBA"];

/// System privileges present in every fresh dictionary
pub const SYSTEM_PRIVILEGES: &[&str] = &[
    "ALTER ANY TABLE",
    "ALTER SESSION",
    "ALTER SYSTEM",
    "ALTER USER",
    "CREATE ANY TABLE",
    "CREATE CLUSTER",
    "CREATE DATABASE LINK",
    "CREATE INDEXTYPE",
    "CREATE JOB",
    "CREATE MATERIALIZED VIEW",
    "CREATE OPERATOR",
    "CREATE PROCEDURE",
    "CREATE ROLE",
    "CREATE SEQUENCE",
    "CREATE SESSION",
    "CREATE SYNONYM",
    "CREATE TABLE",
    "CREATE TRIGGER",
    "CREATE TYPE",
    "CREATE USER",
    "CREATE VIEW",
    "DEBUG CONNECT SESSION",
    "DELETE ANY TABLE",
    "DROP ANY TABLE",
    "DROP USER",
    "EXECUTE ANY PROCEDURE",
    "GRANT ANY PRIVILEGE",
    "GRANT ANY ROLE",
    "INSERT ANY TABLE",
    "SELECT ANY DICTIONARY",
    "SELECT ANY TABLE",
    "UNLIMITED TABLESPACE",
    "UPDATE ANY TABLE",
];

/// A GRANT/REVOKE item resolved against the dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
enum Grantable {
    Role(String),
    SystemPrivilege(String),
}

/// `SQLite` dictionary session
pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    /// Open (or create) a dictionary file
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        let path = config.file.to_str().ok_or_else(|| {
            PrivsyncError::connection_failed("SQLite file path contains invalid UTF-8 characters")
        })?;
        let conn = open_connection(path)?;

        if let Some(timeout_ms) = config.timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout_ms)).map_err(|e| {
                PrivsyncError::connection_failed(format!("Failed to set timeout: {e}"))
            })?;
        }

        Ok(Self { conn })
    }

    /// Open a private in-memory dictionary
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            PrivsyncError::connection_failed(format!("Failed to open in-memory database: {e}"))
        })?;
        Ok(Self { conn })
    }

    /// Create the dictionary tables and seed predefined roles and system privileges
    ///
    /// Safe to run repeatedly.
    pub fn init_catalog(&self) -> Result<()> {
        self.conn.execute_batch(DICTIONARY_DDL).map_err(|e| {
            PrivsyncError::connection_failed(format!("Failed to create dictionary tables: {e}"))
        })?;
        for role in PREDEFINED_ROLES {
            self.insert_principal("INSERT OR IGNORE INTO dba_roles (role) VALUES (?1)", role)?;
        }
        for privilege in SYSTEM_PRIVILEGES {
            self.insert_principal(
                "INSERT OR IGNORE INTO system_privilege_map (name) VALUES (?1)",
                privilege,
            )?;
        }
        Ok(())
    }

    /// Add a schema (user)
    pub fn create_user(&self, name: &str) -> Result<()> {
        self.insert_principal("INSERT OR IGNORE INTO dba_users (username) VALUES (?1)", name)
    }

    /// Add a role
    pub fn create_role(&self, name: &str) -> Result<()> {
        self.insert_principal("INSERT OR IGNORE INTO dba_roles (role) VALUES (?1)", name)
    }

    /// Execute a single statement synchronously
    pub fn execute_sql(&mut self, sql: &str) -> DriverResult<()> {
        let kind = classify_statement(sql).map_err(|e| DriverError::new(e.message()))?;
        let processed = preprocess_sql(sql).map_err(|e| DriverError::new(e.message()))?;

        match kind {
            StatementKind::Grant => self.grant(&processed),
            StatementKind::Revoke => self.revoke(&processed),
            StatementKind::Transaction => self.conn.execute_batch(&processed).map_err(driver_error),
            StatementKind::Read | StatementKind::Other => Err(DriverError::with_code(
                "ORA-00900",
                format!("invalid SQL statement: {sql}"),
            )),
        }
    }

    fn insert_principal(&self, sql: &str, name: &str) -> Result<()> {
        self.conn.execute(sql, params![name.trim().to_uppercase()]).map_err(|e| {
            PrivsyncError::connection_failed(format!("Failed to write dictionary entry {name}: {e}"))
        })?;
        Ok(())
    }

    fn query_column(&self, sql: &str, binds: &[Bind<'_>]) -> DriverResult<Vec<String>> {
        let mut stmt = self.conn.prepare(sql).map_err(driver_error)?;
        let named: Vec<(&str, &dyn ToSql)> =
            binds.iter().map(|(key, value)| (*key, value as &dyn ToSql)).collect();

        let rows = stmt
            .query_map(named.as_slice(), |row| row.get::<_, String>(0))
            .map_err(driver_error)?;
        rows.collect::<std::result::Result<Vec<String>, _>>().map_err(driver_error)
    }

    fn exists(&self, sql: &str, args: &[&str]) -> DriverResult<bool> {
        let mut stmt = self.conn.prepare(sql).map_err(driver_error)?;
        let found: Option<i64> = stmt
            .query_row(rusqlite::params_from_iter(args.iter()), |row| row.get(0))
            .optional()
            .map_err(driver_error)?;
        Ok(found.is_some())
    }

    fn grant(&mut self, processed: &str) -> DriverResult<()> {
        let (items, grantee) = split_dcl(processed, "GRANT", " TO ")?;
        self.require_grantee(&grantee)?;

        let mut resolved = Vec::with_capacity(items.len());
        for item in &items {
            if *item == grantee {
                return Err(DriverError::with_code(
                    "ORA-01934",
                    format!("circular role grant detected: {item}"),
                ));
            }
            resolved.push(self.resolve(item)?);
        }

        for grantable in resolved {
            debug!(?grantable, grantee = %grantee, "grant");
            let result = match &grantable {
                Grantable::Role(role) => self.conn.execute(
                    "INSERT OR IGNORE INTO dba_role_privs (grantee, granted_role) VALUES (?1, ?2)",
                    params![grantee, role],
                ),
                Grantable::SystemPrivilege(privilege) => self.conn.execute(
                    "INSERT OR IGNORE INTO dba_sys_privs (grantee, privilege) VALUES (?1, ?2)",
                    params![grantee, privilege],
                ),
            };
            result.map_err(driver_error)?;
        }
        Ok(())
    }

    fn revoke(&mut self, processed: &str) -> DriverResult<()> {
        let (items, grantee) = split_dcl(processed, "REVOKE", " FROM ")?;
        self.require_grantee(&grantee)?;

        let mut resolved = Vec::with_capacity(items.len());
        for item in &items {
            let grantable = self.resolve(item)?;
            let held = match &grantable {
                Grantable::Role(role) => self.exists(
                    "SELECT 1 FROM dba_role_privs WHERE grantee = ?1 AND granted_role = ?2",
                    &[grantee.as_str(), role.as_str()],
                )?,
                Grantable::SystemPrivilege(privilege) => self.exists(
                    "SELECT 1 FROM dba_sys_privs WHERE grantee = ?1 AND privilege = ?2",
                    &[grantee.as_str(), privilege.as_str()],
                )?,
            };
            if !held {
                return Err(match grantable {
                    Grantable::Role(role) => DriverError::with_code(
                        "ORA-01951",
                        format!("ROLE '{role}' not granted to '{grantee}'"),
                    ),
                    Grantable::SystemPrivilege(_) => DriverError::with_code(
                        "ORA-01952",
                        format!("system privileges not granted to '{grantee}'"),
                    ),
                });
            }
            resolved.push(grantable);
        }

        for grantable in resolved {
            debug!(?grantable, grantee = %grantee, "revoke");
            let result = match &grantable {
                Grantable::Role(role) => self.conn.execute(
                    "DELETE FROM dba_role_privs WHERE grantee = ?1 AND granted_role = ?2",
                    params![grantee, role],
                ),
                Grantable::SystemPrivilege(privilege) => self.conn.execute(
                    "DELETE FROM dba_sys_privs WHERE grantee = ?1 AND privilege = ?2",
                    params![grantee, privilege],
                ),
            };
            result.map_err(driver_error)?;
        }
        Ok(())
    }

    fn require_grantee(&self, grantee: &str) -> DriverResult<()> {
        let is_user = self.exists("SELECT 1 FROM dba_users WHERE username = ?1", &[grantee])?;
        if is_user || self.exists("SELECT 1 FROM dba_roles WHERE role = ?1", &[grantee])? {
            Ok(())
        } else {
            Err(DriverError::with_code(
                "ORA-01917",
                format!("user or role '{grantee}' does not exist"),
            ))
        }
    }

    fn resolve(&self, item: &str) -> DriverResult<Grantable> {
        if self.exists("SELECT 1 FROM dba_roles WHERE role = ?1", &[item])? {
            Ok(Grantable::Role(item.to_string()))
        } else if self.exists("SELECT 1 FROM system_privilege_map WHERE name = ?1", &[item])? {
            Ok(Grantable::SystemPrivilege(item.to_string()))
        } else {
            Err(DriverError::with_code("ORA-01919", format!("role '{item}' does not exist")))
        }
    }
}

impl PrivilegeSession for SqliteSession {
    fn engine_name(&self) -> &'static str {
        "sqlite"
    }

    async fn query_strings(&mut self, sql: &str, binds: &[Bind<'_>]) -> DriverResult<Vec<String>> {
        self.query_column(sql, binds)
    }

    async fn execute(&mut self, sql: &str) -> DriverResult<()> {
        self.execute_sql(sql)
    }

    async fn begin(&mut self) -> DriverResult<()> {
        self.conn.execute_batch("BEGIN").map_err(driver_error)
    }

    async fn commit(&mut self) -> DriverResult<()> {
        self.conn.execute_batch("COMMIT").map_err(driver_error)
    }

    async fn rollback(&mut self) -> DriverResult<()> {
        self.conn.execute_batch("ROLLBACK").map_err(driver_error)
    }
}

/// Open `SQLite` connection read-write, creating the file if needed
fn open_connection(path: &str) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;

    Connection::open_with_flags(path, flags)
        .map_err(|e| PrivsyncError::connection_failed(format!("Failed to open SQLite database: {e}")))
}

fn driver_error(e: rusqlite::Error) -> DriverError {
    DriverError::new(e.to_string())
}

/// Split an upper-cased `GRANT a, b TO x` / `REVOKE a, b FROM x` into items and grantee
fn split_dcl(processed: &str, verb: &str, keyword: &str) -> DriverResult<(Vec<String>, String)> {
    let body = processed.strip_prefix(verb).unwrap_or(processed);
    let (list, grantee) = body
        .rsplit_once(keyword)
        .ok_or_else(|| DriverError::with_code("ORA-00905", "missing keyword"))?;

    let grantee = grantee.trim();
    if grantee.is_empty() || grantee.contains(char::is_whitespace) || grantee.contains(',') {
        return Err(DriverError::with_code("ORA-00987", "missing or invalid username(s)"));
    }

    let items: Vec<String> = list
        .split(',')
        .map(|item| item.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|item| !item.is_empty())
        .collect();
    if items.is_empty() {
        return Err(DriverError::with_code("ORA-00990", "missing or invalid privilege"));
    }

    Ok((items, grantee.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session() -> SqliteSession {
        let session = SqliteSession::in_memory().unwrap();
        session.init_catalog().unwrap();
        session.create_user("scott").unwrap();
        session.create_role("app_role").unwrap();
        session
    }

    fn held(session: &SqliteSession, table_query: &str, grantee: &str) -> Vec<String> {
        let mut values = session.query_column(table_query, &[(":name", grantee)]).unwrap();
        values.sort();
        values
    }

    const ROLES: &str = "SELECT granted_role FROM dba_role_privs WHERE grantee = :name";
    const PRIVS: &str = "SELECT privilege FROM dba_sys_privs WHERE grantee = :name";

    #[test]
    fn test_init_catalog_is_idempotent() {
        let session = session();
        session.init_catalog().unwrap();
        let roles = session.query_column("SELECT role FROM dba_roles ORDER BY role", &[]).unwrap();
        assert_eq!(roles, vec!["APP_ROLE", "CONNECT", "DBA", "RESOURCE"]);
    }

    #[test]
    fn test_grant_roles_and_system_privileges() {
        let mut session = session();
        session.execute_sql("grant connect, create session to scott").unwrap();
        assert_eq!(held(&session, ROLES, "SCOTT"), vec!["CONNECT"]);
        assert_eq!(held(&session, PRIVS, "SCOTT"), vec!["CREATE SESSION"]);

        // Re-granting is not an error
        session.execute_sql("GRANT CONNECT TO SCOTT").unwrap();
        assert_eq!(held(&session, ROLES, "SCOTT"), vec!["CONNECT"]);
    }

    #[test]
    fn test_grant_to_role() {
        let mut session = session();
        session.execute_sql("GRANT CREATE TABLE, RESOURCE TO APP_ROLE").unwrap();
        assert_eq!(held(&session, ROLES, "APP_ROLE"), vec!["RESOURCE"]);
        assert_eq!(held(&session, PRIVS, "APP_ROLE"), vec!["CREATE TABLE"]);
    }

    #[test]
    fn test_grant_unknown_privilege_writes_nothing() {
        let mut session = session();
        let err = session.execute_sql("GRANT CONNECT, NOT_A_ROLE TO SCOTT").unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ORA-01919"));
        assert!(held(&session, ROLES, "SCOTT").is_empty());
    }

    #[test]
    fn test_grant_to_unknown_grantee() {
        let mut session = session();
        let err = session.execute_sql("GRANT CONNECT TO NOBODY").unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ORA-01917"));
    }

    #[test]
    fn test_grant_role_to_itself() {
        let mut session = session();
        let err = session.execute_sql("GRANT APP_ROLE TO APP_ROLE").unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ORA-01934"));
    }

    #[test]
    fn test_revoke_requires_held_privilege() {
        let mut session = session();
        session.execute_sql("GRANT DBA, CREATE SESSION TO SCOTT").unwrap();

        let err = session.execute_sql("REVOKE CONNECT FROM SCOTT").unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ORA-01951"));

        let err = session.execute_sql("REVOKE DBA, CREATE TABLE FROM SCOTT").unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ORA-01952"));
        // Nothing was revoked by the failed statement
        assert_eq!(held(&session, ROLES, "SCOTT"), vec!["DBA"]);

        session.execute_sql("REVOKE DBA, CREATE SESSION FROM SCOTT;").unwrap();
        assert!(held(&session, ROLES, "SCOTT").is_empty());
        assert!(held(&session, PRIVS, "SCOTT").is_empty());
    }

    #[test]
    fn test_non_dcl_statements_rejected() {
        let mut session = session();
        let err = session.execute_sql("DROP TABLE dba_users").unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ORA-00900"));
        assert!(session.execute_sql("GRANT DBA SCOTT").is_err());
        assert!(session.execute_sql("GRANT TO SCOTT").is_err());
    }

    #[tokio::test]
    async fn test_rollback_discards_grants() {
        let mut session = session();
        session.begin().await.unwrap();
        session.execute("GRANT DBA TO SCOTT").await.unwrap();
        session.rollback().await.unwrap();
        assert!(held(&session, ROLES, "SCOTT").is_empty());

        session.begin().await.unwrap();
        session.execute("GRANT DBA TO SCOTT").await.unwrap();
        session.commit().await.unwrap();
        assert_eq!(held(&session, ROLES, "SCOTT"), vec!["DBA"]);
    }

    #[test]
    fn test_split_dcl() {
        let (items, grantee) =
            split_dcl("GRANT CREATE  SESSION, DBA TO SCOTT", "GRANT", " TO ").unwrap();
        assert_eq!(items, vec!["CREATE SESSION", "DBA"]);
        assert_eq!(grantee, "SCOTT");

        let (items, grantee) = split_dcl("REVOKE CONNECT FROM APP_ROLE", "REVOKE", " FROM ").unwrap();
        assert_eq!(items, vec!["CONNECT"]);
        assert_eq!(grantee, "APP_ROLE");
    }
}
