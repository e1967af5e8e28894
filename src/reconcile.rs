//! Reconciliation
//!
//! One call brings one principal to a declared privilege state:
//!
//! 1. Normalize the requested grants
//! 2. Check the principal exists
//! 3. Read its current roles and system privileges
//! 4. Diff and build a plan for the requested mode
//! 5. Apply the plan, or only report it in check mode
//!
//! Nothing is cached between calls; every call re-reads the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument};

use crate::apply::{Applier, CancellationToken};
use crate::capability::Capabilities;
use crate::catalog::{CatalogReader, PrincipalLookup};
use crate::diff::compute_diff;
use crate::engine::PrivilegeSession;
use crate::error::{PrivsyncError, Result};
use crate::normalize::{normalize_list, PrivilegeSet};
use crate::output::Outcome;
use crate::plan::{converge_plan, remove_all_plan, removal_plan, Plan};
use crate::principal::Principal;

/// Declared target state for a principal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// Hold exactly the requested privileges
    #[default]
    Present,
    /// Hold none of the requested privileges
    Absent,
    /// Hold no privileges at all
    #[serde(rename = "removeall", alias = "REMOVEALL")]
    RemoveAll,
}

impl DesiredState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::RemoveAll => "removeall",
        }
    }

    /// Whether the mode needs an explicit grant list
    #[must_use]
    pub const fn requires_grants(&self) -> bool {
        !matches!(self, Self::RemoveAll)
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DesiredState {
    type Err = PrivsyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "removeall" => Ok(Self::RemoveAll),
            other => Err(PrivsyncError::validation(format!(
                "Unknown state '{other}': expected present, absent or removeall"
            ))),
        }
    }
}

/// Input of one reconciliation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub principal: Principal,
    /// Raw grant entries; each may hold a comma-separated list
    #[serde(default)]
    pub grants: Option<Vec<String>>,
    #[serde(default)]
    pub state: DesiredState,
}

impl ReconcileRequest {
    #[must_use]
    pub const fn new(principal: Principal, grants: Option<Vec<String>>, state: DesiredState) -> Self {
        Self { principal, grants, state }
    }

    /// Normalized grant set for modes that take one
    ///
    /// REMOVEALL ignores any grants supplied.
    fn desired(&self) -> Result<PrivilegeSet> {
        if !self.state.requires_grants() {
            return Ok(PrivilegeSet::new());
        }
        let raw = self.grants.as_deref().unwrap_or_default();
        let desired = normalize_list(raw)?;
        if desired.is_empty() {
            return Err(PrivsyncError::validation(format!(
                "grants are required when state is {}",
                self.state
            )));
        }
        Ok(desired)
    }
}

/// Drives reconciliation calls over one borrowed session
pub struct Reconciler<'a, S> {
    session: &'a mut S,
    caps: Capabilities,
    cancel: CancellationToken,
}

impl<'a, S: PrivilegeSession> Reconciler<'a, S> {
    pub fn new(session: &'a mut S, caps: Capabilities) -> Self {
        Self { session, caps, cancel: CancellationToken::new() }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reconcile, folding any error into a `Failed` outcome
    pub async fn run(&mut self, request: &ReconcileRequest) -> Outcome {
        match self.try_run(request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                info!(principal = %request.principal, code = err.error_code(), "reconciliation failed");
                Outcome::from_error(&err)
            }
        }
    }

    /// Reconcile, surfacing errors to the caller
    #[instrument(skip_all, fields(principal = %request.principal, state = %request.state))]
    pub async fn try_run(&mut self, request: &ReconcileRequest) -> Result<Outcome> {
        let desired = request.desired()?;
        let principal = &request.principal;
        let subject = format!("{} {}", principal.kind().title(), principal.name());

        let mut reader = CatalogReader::new(&mut *self.session).with_timeout_ms(self.caps.timeout_ms);
        match reader.principal_exists(principal.kind(), principal.name()).await? {
            PrincipalLookup::Found => {}
            PrincipalLookup::Missing { reason } => {
                return match request.state {
                    DesiredState::Present => {
                        Err(PrivsyncError::not_found(principal.kind(), principal.name()))
                    }
                    // Nothing to take away from a principal that does not exist
                    DesiredState::Absent | DesiredState::RemoveAll => Ok(Outcome::unchanged(reason)),
                };
            }
        }

        let current = reader.current_state(principal).await?;
        let (plan, unchanged, changed) = match request.state {
            DesiredState::Present => (
                converge_plan(
                    principal,
                    compute_diff(&desired, &current.roles, &current.system_privileges),
                ),
                format!("{subject} already has the requested privileges"),
                format!("Updated privileges for {principal}"),
            ),
            DesiredState::Absent => (
                removal_plan(principal, &desired, &current),
                format!("{subject} does not hold the requested grant(s)"),
                format!("Revoked requested grant(s) from {principal}"),
            ),
            DesiredState::RemoveAll => (
                remove_all_plan(principal, &current),
                format!("{subject} holds no privileges"),
                format!("Revoked all privileges from {principal}"),
            ),
        };

        if plan.is_empty() {
            info!("already converged");
            return Ok(Outcome::unchanged(unchanged));
        }

        if !self.caps.can_apply() {
            info!(statements = plan.len(), "check mode, plan not applied");
            return Ok(Outcome::would_change(changed, plan.sql()));
        }

        self.apply(&plan, changed).await
    }

    async fn apply(&mut self, plan: &Plan, message: String) -> Result<Outcome> {
        let summary = Applier::new(&mut *self.session, self.caps.clone())
            .with_cancellation(self.cancel.clone())
            .apply(plan)
            .await?;
        info!(statements = summary.statements.len(), "reconciled");
        Ok(Outcome::changed(message, summary.statements))
    }
}
