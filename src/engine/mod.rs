//! Privilege Session Trait and Core Types
//!
//! This module defines the transport seam between the reconciliation core and a database.
//! A `PrivilegeSession` is one open connection: the core issues read-only dictionary
//! queries and GRANT/REVOKE statements over it, strictly one at a time.
//!
//! # Session Ownership
//! Opening the session (credentials, DSN, wallet, elevated login) is the caller's job.
//! The core only borrows an already-open session for the duration of one call.
//!
//! # Engine Isolation
//! Each engine implementation is completely independent.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::error::{PrivsyncError, Result};

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// A named bind value for a dictionary query (`(":name", "SCOTT")`)
pub type Bind<'a> = (&'a str, &'a str);

/// Result of a driver call
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Failure reported by the underlying driver
///
/// Kept as a value (not a formatted string) so the core can attach the query or
/// statement text that triggered it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{message}", code.as_deref().map(|c| format!("{c}: ")).unwrap_or_default())]
pub struct DriverError {
    /// Vendor error code (e.g. `ORA-01919`), when the driver reports one
    pub code: Option<String>,
    /// Driver error text
    pub message: String,
}

impl DriverError {
    /// Create a driver error without a vendor code
    pub fn new(message: impl Into<String>) -> Self {
        Self { code: None, message: message.into() }
    }

    /// Create a driver error with a vendor code
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: Some(code.into()), message: message.into() }
    }
}

/// Connection configuration for the dictionary backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database file path
    pub file: PathBuf,

    /// Per-query and per-statement time limit in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ConnectionConfig {
    /// Create a config for a database file with no time limit
    #[must_use]
    pub const fn new(file: PathBuf) -> Self {
        Self { file, timeout_ms: None }
    }

    /// Set the time limit
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Privilege session trait
///
/// All methods take `&mut self`: a session serves exactly one call at a time.
pub trait PrivilegeSession {
    /// Engine name used in output envelopes and logs
    fn engine_name(&self) -> &'static str;

    /// Run a read-only dictionary query and return the first column of every row
    ///
    /// Binds are named (`:name`) and must all appear in `sql`.
    fn query_strings(
        &mut self,
        sql: &str,
        binds: &[Bind<'_>],
    ) -> impl Future<Output = DriverResult<Vec<String>>> + Send;

    /// Execute one mutating statement
    fn execute(
        &mut self,
        sql: &str,
    ) -> impl Future<Output = DriverResult<()>> + Send;

    /// Start a transaction
    fn begin(&mut self) -> impl Future<Output = DriverResult<()>> + Send;

    /// Commit the current transaction
    fn commit(&mut self) -> impl Future<Output = DriverResult<()>> + Send;

    /// Roll back the current transaction
    fn rollback(&mut self) -> impl Future<Output = DriverResult<()>> + Send;
}

/// Await a session future, bounded by an optional time limit
///
/// The outer `Result` reports the timeout, the inner one the driver outcome.
pub(crate) async fn bounded<T, F>(
    future: F,
    timeout_ms: Option<u64>,
    operation: &str,
) -> Result<DriverResult<T>>
where
    F: Future<Output = DriverResult<T>>,
{
    match timeout_ms {
        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), future)
            .await
            .map_err(|_| PrivsyncError::timeout(operation, ms)),
        None => Ok(future.await),
    }
}
