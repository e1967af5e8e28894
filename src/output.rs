//! JSON Output Types
//!
//! This module defines the structured JSON output format for all privsync operations.
//!
//! # Output Contract
//! - Success: `{"ok": true, "engine": "...", "command": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "engine": "...", "command": "...", "error": {"code": "...", "message": "..."}}`
//!
//! A reconciliation itself reports a tagged [`Outcome`]: `unchanged`, `changed` or
//! `failed`, the contract declarative-state automation tools expect.

use serde::{Deserialize, Serialize};

use crate::error::PrivsyncError;

/// Result of one reconciliation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// Nothing needed to change
    Unchanged { message: String },

    /// Statements were applied (or, in check mode, would be)
    Changed {
        message: String,
        statements_applied: Vec<String>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        dry_run: bool,
    },

    /// The call failed
    Failed { code: String, message: String },
}

impl Outcome {
    pub fn unchanged(message: impl Into<String>) -> Self {
        Self::Unchanged { message: message.into() }
    }

    pub fn changed(message: impl Into<String>, statements_applied: Vec<String>) -> Self {
        Self::Changed { message: message.into(), statements_applied, dry_run: false }
    }

    /// Planned but not applied
    pub fn would_change(message: impl Into<String>, statements: Vec<String>) -> Self {
        Self::Changed { message: message.into(), statements_applied: statements, dry_run: true }
    }

    /// Fold an error into a `Failed` outcome
    #[must_use]
    pub fn from_error(err: &PrivsyncError) -> Self {
        Self::Failed { code: err.error_code().to_string(), message: err.message() }
    }

    #[must_use]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Unchanged { message }
            | Self::Changed { message, .. }
            | Self::Failed { message, .. } => message,
        }
    }
}

/// Success envelope for operation results
///
/// Generic over the data type to support different operation return values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Session engine used for this operation
    pub engine: String,

    /// Command that was executed (reconcile, connect, init-catalog)
    pub command: String,

    /// Operation-specific data
    pub data: T,

    /// Execution metadata
    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    /// Create a new success envelope
    pub fn new(engine: impl Into<String>, command: impl Into<String>, data: T, meta: Metadata) -> Self {
        Self { ok: true, engine: engine.into(), command: command.into(), data, meta }
    }
}

/// Error envelope for operation failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    /// Session engine (empty string if the failure happened before a session existed)
    pub engine: String,

    /// Command that was attempted
    pub command: String,

    /// Error information
    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    /// Create error envelope from `PrivsyncError`
    pub fn from_error(engine: impl Into<String>, command: impl Into<String>, err: &PrivsyncError) -> Self {
        Self {
            ok: false,
            engine: engine.into(),
            command: command.into(),
            error: ErrorInfo { code: err.error_code().to_string(), message: err.message() },
        }
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "NOT_FOUND", "EXECUTION_FAILED")
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of statements applied (reconcile only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statements_applied: Option<usize>,
}

impl Metadata {
    /// Create new metadata with just execution time
    pub fn new(execution_ms: u64) -> Self {
        Self { execution_ms, statements_applied: None }
    }

    /// Create new metadata with execution time and applied statement count
    pub fn with_statements(execution_ms: u64, statements_applied: usize) -> Self {
        Self { execution_ms, statements_applied: Some(statements_applied) }
    }
}
