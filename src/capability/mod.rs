//! Statement Classification and Apply Permissions
//!
//! Every statement the core hands to a session passes through here first.
//!
//! # Validation Strategy
//! - Conservative approach (fail-safe defaults)
//! - Only GRANT and REVOKE may be applied, and only when capabilities allow it
//! - Dictionary reads must be plain SELECTs
//! - Multi-statement input is rejected outright

use serde::{Deserialize, Serialize};

use crate::error::{PrivsyncError, Result};

/// Apply capabilities
///
/// Defaults to the most restrictive setting: plan only, nothing applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Allow GRANT/REVOKE statements to run
    /// Default: false (check mode)
    #[serde(default)]
    pub allow_apply: bool,

    /// Per-query and per-statement timeout in milliseconds
    /// None means no timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Capabilities {
    /// Plan-only capabilities (default)
    #[must_use]
    pub fn check_only() -> Self {
        Self::default()
    }

    /// Capabilities that allow applying plans
    #[must_use]
    pub fn with_apply() -> Self {
        Self { allow_apply: true, ..Default::default() }
    }

    /// Set the timeout
    #[must_use]
    pub const fn timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Check if mutating statements may run
    #[must_use]
    pub const fn can_apply(&self) -> bool {
        self.allow_apply
    }
}

/// Statement category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT / WITH
    Read,
    /// GRANT ... TO ...
    Grant,
    /// REVOKE ... FROM ...
    Revoke,
    /// BEGIN / COMMIT / ROLLBACK
    Transaction,
    /// Anything else
    Other,
}

/// Classify a single SQL statement
///
/// Fails on empty input and on input containing more than one statement.
pub fn classify_statement(sql: &str) -> Result<StatementKind> {
    let processed = preprocess_sql(sql)?;
    let first_word = processed.split_whitespace().next().unwrap_or_default();

    Ok(match first_word {
        "SELECT" | "WITH" => StatementKind::Read,
        "GRANT" => StatementKind::Grant,
        "REVOKE" => StatementKind::Revoke,
        "BEGIN" | "COMMIT" | "ROLLBACK" => StatementKind::Transaction,
        _ => StatementKind::Other,
    })
}

/// Check that a statement may be applied under the given capabilities
pub fn check_statement(sql: &str, caps: &Capabilities) -> Result<StatementKind> {
    let kind = classify_statement(sql)?;
    match kind {
        StatementKind::Grant | StatementKind::Revoke if caps.can_apply() => Ok(kind),
        StatementKind::Grant | StatementKind::Revoke => Err(PrivsyncError::capability_violation(
            format!("Applying statements is disabled for this run (check mode):\n\n{sql}"),
        )),
        _ => Err(PrivsyncError::capability_violation(format!(
            "Only GRANT and REVOKE statements can be applied:\n\n{sql}"
        ))),
    }
}

/// Check that a dictionary query is read-only
pub fn check_read_only(sql: &str) -> Result<()> {
    match classify_statement(sql)? {
        StatementKind::Read => Ok(()),
        _ => Err(PrivsyncError::capability_violation(format!(
            "Catalog queries must be read-only:\n\n{sql}"
        ))),
    }
}

/// Pre-process SQL before categorization
///
/// This function:
/// 1. Strips SQL comments (-- and /* */)
/// 2. Trims whitespace and a single trailing semicolon
/// 3. Detects multi-statement input (rejects it)
/// 4. Normalizes to uppercase for pattern matching
pub(crate) fn preprocess_sql(sql: &str) -> Result<String> {
    let processed = strip_comments(sql);
    let processed = processed.trim();
    let processed = processed.strip_suffix(';').unwrap_or(processed).trim();

    if processed.is_empty() {
        return Err(PrivsyncError::validation("Statement cannot be empty"));
    }

    if processed.contains(';') {
        return Err(PrivsyncError::validation("Multi-statement input is not supported"));
    }

    Ok(processed.to_uppercase())
}

/// Strip SQL comments
///
/// Handles:
/// - Line comments: -- comment
/// - Block comments: /* comment */
fn strip_comments(sql: &str) -> String {
    let mut result = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for ch in chars.by_ref() {
                    if prev == '*' && ch == '/' {
                        break;
                    }
                    prev = ch;
                }
                result.push(' ');
            }
            _ => result.push(ch),
        }
    }

    result
}
