//! Applier
//!
//! Executes a plan against an open session, one statement at a time, inside a
//! single transaction.
//!
//! # Failure Handling
//! - The first failing statement stops the run; later statements are not attempted
//! - The transaction is rolled back, so a plan is applied completely or not at all
//! - If the rollback itself fails, the error says which statements remain applied
//! - A cancellation token is checked before each statement
//! - A statement or COMMIT that exceeds the time limit is rolled back like a failure

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capability::{check_statement, Capabilities};
use crate::engine::{bounded, DriverError, PrivilegeSession};
use crate::error::{PrivsyncError, Result};
use crate::plan::Plan;

/// Cooperative cancellation signal shared between the caller and the applier
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Statements executed by a successful apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSummary {
    pub statements: Vec<String>,
}

/// Executes plans over a borrowed session
pub struct Applier<'a, S> {
    session: &'a mut S,
    caps: Capabilities,
    cancel: CancellationToken,
}

impl<'a, S: PrivilegeSession> Applier<'a, S> {
    pub fn new(session: &'a mut S, caps: Capabilities) -> Self {
        Self { session, caps, cancel: CancellationToken::new() }
    }

    /// Observe an external cancellation signal
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Apply every statement of the plan, atomically
    pub async fn apply(&mut self, plan: &Plan) -> Result<AppliedSummary> {
        let statements = plan.sql();
        if statements.is_empty() {
            return Ok(AppliedSummary::default());
        }

        // Capability checks happen before anything reaches the session
        for sql in &statements {
            check_statement(sql, &self.caps)?;
        }

        let timeout_ms = self.caps.timeout_ms;
        bounded(self.session.begin(), timeout_ms, "BEGIN")
            .await?
            .map_err(|source| execution_error("BEGIN", source, Vec::new(), false))?;

        let mut applied: Vec<String> = Vec::with_capacity(statements.len());
        for sql in statements {
            if self.cancel.is_cancelled() {
                warn!(applied = applied.len(), "reconciliation cancelled, rolling back");
                let rolled_back = self.rollback().await;
                return Err(PrivsyncError::Cancelled { applied, rolled_back });
            }

            debug!(statement = %sql, "executing");
            let outcome = bounded(self.session.execute(&sql), timeout_ms, &sql).await;
            match outcome {
                Ok(Ok(())) => applied.push(sql),
                Ok(Err(source)) => {
                    warn!(statement = %sql, error = %source, "statement failed, rolling back");
                    let rolled_back = self.rollback().await;
                    return Err(execution_error(sql, source, applied, rolled_back));
                }
                Err(timeout) => {
                    warn!(statement = %sql, "statement timed out, rolling back");
                    let rolled_back = self.rollback().await;
                    return Err(interrupted(timeout, applied, rolled_back));
                }
            }
        }

        match bounded(self.session.commit(), timeout_ms, "COMMIT").await {
            Ok(Ok(())) => {
                info!(statements = applied.len(), "plan applied");
                Ok(AppliedSummary { statements: applied })
            }
            Ok(Err(source)) => {
                warn!(error = %source, "commit failed, rolling back");
                let rolled_back = self.rollback().await;
                Err(execution_error("COMMIT", source, applied, rolled_back))
            }
            Err(timeout) => {
                warn!("commit timed out, rolling back");
                let rolled_back = self.rollback().await;
                Err(interrupted(timeout, applied, rolled_back))
            }
        }
    }

    async fn rollback(&mut self) -> bool {
        match bounded(self.session.rollback(), self.caps.timeout_ms, "ROLLBACK").await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "rollback failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "rollback timed out");
                false
            }
        }
    }
}

fn execution_error(
    statement: impl Into<String>,
    source: DriverError,
    applied: Vec<String>,
    rolled_back: bool,
) -> PrivsyncError {
    PrivsyncError::Execution { statement: statement.into(), source, applied, rolled_back }
}

// Attach transaction progress to a timeout raised mid-apply
fn interrupted(err: PrivsyncError, applied: Vec<String>, rolled_back: bool) -> PrivsyncError {
    match err {
        PrivsyncError::Timeout { operation, timeout_ms, .. } => {
            PrivsyncError::Timeout { operation, timeout_ms, applied, rolled_back }
        }
        other => other,
    }
}
