//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout privsync.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `Validation`: Missing, empty or malformed input (principal name, grant list)
//! - `NotFound`: The principal does not exist in the catalog
//! - `CatalogQuery`: A read-only dictionary query failed
//! - `Execution`: A GRANT/REVOKE statement failed while applying a plan
//! - `Cancelled` / `Timeout`: Apply or query interrupted before completion
//! - `CapabilityViolation`: Statement not permitted by the active capabilities
//! - `ConnectionFailed` / `ConfigError`: Session setup and configuration problems

use thiserror::Error;

use crate::engine::DriverError;
use crate::principal::PrincipalKind;

/// Main error type for privsync operations
#[derive(Error, Debug)]
pub enum PrivsyncError {
    /// Missing or malformed required input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Principal does not exist
    #[error("{} {name} does not exist", kind.title())]
    NotFound { kind: PrincipalKind, name: String },

    /// Read-only catalog query failed
    #[error("Catalog query failed: {source} (query: {query})")]
    CatalogQuery {
        query: String,
        #[source]
        source: DriverError,
    },

    /// Mutating statement failed
    #[error("Statement failed: {source} (statement: {statement}){}", rollback_note(*rolled_back, applied))]
    Execution {
        statement: String,
        #[source]
        source: DriverError,
        /// Statements that had succeeded before the failure
        applied: Vec<String>,
        rolled_back: bool,
    },

    /// Apply was cancelled between statements
    #[error("Reconciliation cancelled{}", rollback_note(*rolled_back, applied))]
    Cancelled { applied: Vec<String>, rolled_back: bool },

    /// Query or statement exceeded the configured time limit
    #[error("Timed out after {timeout_ms} ms: {operation}{}", rollback_note(*rolled_back, applied))]
    Timeout {
        operation: String,
        timeout_ms: u64,
        /// Statements that had succeeded before the time limit was hit
        applied: Vec<String>,
        rolled_back: bool,
    },

    /// Statement blocked by capability constraints
    #[error("Capability violation: {0}")]
    CapabilityViolation(String),

    /// Session could not be opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Configuration error (file not found, invalid JSON, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn rollback_note(rolled_back: bool, applied: &[String]) -> String {
    if applied.is_empty() {
        String::new()
    } else if rolled_back {
        format!("; rolled back {} earlier statement(s)", applied.len())
    } else {
        format!("; {} earlier statement(s) remain applied", applied.len())
    }
}

impl PrivsyncError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::CatalogQuery { .. } => "CATALOG_QUERY_FAILED",
            Self::Execution { .. } => "EXECUTION_FAILED",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::CapabilityViolation(_) => "CAPABILITY_VIOLATION",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Get human-readable error message
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a timeout error for an operation outside any transaction
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
            applied: Vec::new(),
            rolled_back: false,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error for a principal
    pub fn not_found(kind: PrincipalKind, name: impl Into<String>) -> Self {
        Self::NotFound { kind, name: name.into() }
    }

    /// Create a catalog query error carrying the issued query text
    pub fn catalog_query(query: impl Into<String>, source: DriverError) -> Self {
        Self::CatalogQuery { query: query.into(), source }
    }

    /// Create a capability violation error
    pub fn capability_violation(message: impl Into<String>) -> Self {
        Self::CapabilityViolation(message.into())
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for privsync operations
pub type Result<T> = std::result::Result<T, PrivsyncError>;
