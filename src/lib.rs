//! Privsync - Declarative Privilege Reconciliation
//!
//! Privsync brings a database schema or role to a declared set of roles and system
//! privileges. It reads current grants from the data dictionary, computes the minimal
//! GRANT/REVOKE plan, and applies it atomically (or only reports it in check mode).
//!
//! # Core Principles
//! - Idempotent: a second call with the same input changes nothing
//! - Case-insensitive: names and privileges are compared in upper case
//! - Deterministic: identical inputs produce identical statements, in identical order
//! - Plan only by default: applying requires explicit capabilities
//!
//! # Module Organization
//! - [`normalize`] - Grant list and name normalization
//! - [`principal`] - Schema and role identities
//! - [`catalog`] - Dictionary reads and existence checks
//! - [`diff`] - Desired vs current comparison, including the bundle exception
//! - [`plan`] - GRANT/REVOKE statement construction
//! - [`apply`] - Transactional plan execution
//! - [`reconcile`] - The end-to-end call
//! - [`engine`] - Session trait and the `SQLite` dictionary engine
//! - [`capability`] - Statement classification and apply permissions
//! - [`config`] - Named connection registry
//! - [`output`] - Outcome and JSON envelope types
//! - [`error`] - Error types
//! - [`logging`] - `tracing` subscriber setup

pub mod apply;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod plan;
pub mod principal;
pub mod reconcile;

// Re-export commonly used types for convenience
pub use apply::{AppliedSummary, Applier, CancellationToken};
pub use capability::{check_statement, classify_statement, Capabilities, StatementKind};
pub use catalog::{CatalogReader, CurrentState, PrincipalLookup};
pub use config::{
    list_connections, resolve_connection, save_connection, ConfigLocation, ConnectionRegistry,
    StoredConnection,
};
pub use diff::{compute_diff, removal_diff, PrivilegeDiff, BUNDLE_PRIVILEGES};
pub use engine::{ConnectionConfig, DriverError, PrivilegeSession};
pub use error::{PrivsyncError, Result};
pub use normalize::{normalize_list, normalize_name, Privilege, PrivilegeSet};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, Outcome, SuccessEnvelope};
pub use plan::{converge_plan, remove_all_plan, removal_plan, Action, Plan, Statement};
pub use principal::{Principal, PrincipalKind};
pub use reconcile::{DesiredState, ReconcileRequest, Reconciler};

#[cfg(feature = "sqlite")]
pub use engine::sqlite::SqliteSession;
