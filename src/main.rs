//! Privsync CLI Entry Point
//!
//! Subcommands:
//! - `reconcile` - Bring a schema or role to a declared privilege state
//! - `connect` - Save a named dictionary connection
//! - `connections` - List saved connections
//! - `init-catalog` - Create (or extend) a `SQLite` dictionary file
//!
//! All output to stdout is JSON-only. Logs go to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, warn};

use privsync::config::{list_connections, resolve_connection, save_connection, ConfigLocation};
use privsync::engine::sqlite::SqliteSession;
use privsync::logging::init_logging;
use privsync::{
    CancellationToken, Capabilities, ConnectionConfig, DesiredState, ErrorEnvelope, Metadata,
    Outcome, Principal, PrivilegeSession, PrivsyncError, ReconcileRequest, Reconciler,
    SuccessEnvelope,
};

const ENGINE: &str = "sqlite";

/// Privsync - declarative privilege reconciliation
#[derive(Parser)]
#[command(name = "privsync")]
#[command(about = "Reconcile database roles and system privileges to a declared state")]
#[command(version)]
struct Cli {
    /// Log level for stderr diagnostics (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring a schema or role to the declared privilege state
    Reconcile {
        /// Target schema (user)
        #[arg(long, conflicts_with = "role")]
        schema: Option<String>,

        /// Target role
        #[arg(long)]
        role: Option<String>,

        /// Roles or system privileges; repeatable, each may be comma-separated
        #[arg(long)]
        grants: Vec<String>,

        /// present, absent or removeall
        #[arg(long, default_value = "present")]
        state: DesiredState,

        /// Named connection from the config files
        #[arg(long, conflicts_with = "file")]
        connection: Option<String>,

        /// Dictionary file, bypassing the config files
        #[arg(long)]
        file: Option<PathBuf>,

        /// Time limit per query and statement, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Report the plan without applying it
        #[arg(long)]
        check: bool,
    },

    /// Save a named dictionary connection
    Connect {
        #[arg(long)]
        name: String,

        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Plans are reported, never applied, through this connection
        #[arg(long)]
        readonly: bool,

        /// Save to the per-user config instead of `.privsync/config.json`
        #[arg(long)]
        global: bool,
    },

    /// List saved connections (local entries override global ones)
    Connections,

    /// Create the dictionary tables in a `SQLite` file and add principals
    InitCatalog {
        #[arg(long)]
        file: PathBuf,

        /// Schema to create; repeatable
        #[arg(long = "user")]
        users: Vec<String>,

        /// Role to create; repeatable
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

#[derive(Serialize)]
struct ConnectionSaved {
    name: String,
    file: PathBuf,
    readonly: bool,
    saved_to: PathBuf,
}

#[derive(Serialize)]
struct ConnectionEntry {
    name: String,
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
    readonly: bool,
}

#[derive(Serialize)]
struct CatalogInitialized {
    file: PathBuf,
    users: Vec<String>,
    roles: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let start = Instant::now();
    let (command, result) = match cli.command {
        Commands::Reconcile { schema, role, grants, state, connection, file, timeout_ms, check } => {
            let request = Principal::from_selection(schema.as_deref(), role.as_deref())
                .map(|principal| ReconcileRequest::new(principal, Some(grants), state));
            let result = match request {
                Ok(request) => {
                    run_reconcile(&request, connection.as_deref(), file, timeout_ms, check, start)
                        .await
                }
                Err(e) => Err(e),
            };
            ("reconcile", result)
        }
        Commands::Connect { name, file, timeout_ms, readonly, global } => {
            ("connect", run_connect(name, file, timeout_ms, readonly, global, start))
        }
        Commands::Connections => ("connections", run_connections(start)),
        Commands::InitCatalog { file, users, roles } => {
            ("init-catalog", run_init_catalog(file, users, roles, start))
        }
    };

    match result {
        Ok(json) => {
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            debug!(error = ?err, "command failed");
            println!("{}", serde_json::to_string(&ErrorEnvelope::from_error(ENGINE, command, &err))?);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn envelope<T: Serialize>(command: &str, data: T, meta: Metadata) -> privsync::Result<String> {
    serde_json::to_string(&SuccessEnvelope::new(ENGINE, command, data, meta))
        .map_err(|e| PrivsyncError::config_error(format!("Could not serialize output: {e}")))
}

async fn run_reconcile(
    request: &ReconcileRequest,
    connection: Option<&str>,
    file: Option<PathBuf>,
    timeout_ms: Option<u64>,
    check: bool,
    start: Instant,
) -> privsync::Result<String> {
    // --file wins over the config files; explicit files are never readonly
    let (mut config, readonly) = match file {
        Some(file) => (ConnectionConfig::new(file), false),
        None => resolve_connection(connection)?,
    };
    if let Some(timeout_ms) = timeout_ms {
        config = config.with_timeout_ms(timeout_ms);
    }

    let caps = if check || readonly {
        Capabilities::check_only()
    } else {
        Capabilities::with_apply()
    };
    let caps = caps.timeout_ms(config.timeout_ms);

    let mut session = SqliteSession::open(&config)?;
    debug!(engine = session.engine_name(), file = %config.file.display(), "session open");

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            signal.cancel();
        }
    });

    let outcome = Reconciler::new(&mut session, caps).with_cancellation(cancel).try_run(request).await?;
    let applied = match &outcome {
        Outcome::Changed { statements_applied, dry_run: false, .. } => statements_applied.len(),
        _ => 0,
    };
    envelope("reconcile", outcome, Metadata::with_statements(elapsed_ms(start), applied))
}

fn run_connect(
    name: String,
    file: PathBuf,
    timeout_ms: Option<u64>,
    readonly: bool,
    global: bool,
    start: Instant,
) -> privsync::Result<String> {
    let mut config = ConnectionConfig::new(file);
    if let Some(timeout_ms) = timeout_ms {
        config = config.with_timeout_ms(timeout_ms);
    }

    // Validate before saving: the file must open as a database
    SqliteSession::open(&config)?;

    let location = if global { ConfigLocation::Global } else { ConfigLocation::Local };
    let saved_to = save_connection(&name, config.clone(), readonly, location)?;

    let data = ConnectionSaved { name, file: config.file, readonly, saved_to };
    envelope("connect", data, Metadata::new(elapsed_ms(start)))
}

fn run_connections(start: Instant) -> privsync::Result<String> {
    let data: Vec<ConnectionEntry> = list_connections()?
        .into_iter()
        .map(|(name, config, readonly)| ConnectionEntry {
            name,
            file: config.file,
            timeout_ms: config.timeout_ms,
            readonly,
        })
        .collect();
    envelope("connections", data, Metadata::new(elapsed_ms(start)))
}

fn run_init_catalog(
    file: PathBuf,
    users: Vec<String>,
    roles: Vec<String>,
    start: Instant,
) -> privsync::Result<String> {
    let session = SqliteSession::open(&ConnectionConfig::new(file.clone()))?;
    session.init_catalog()?;

    let mut created_users = Vec::with_capacity(users.len());
    for user in &users {
        let name = privsync::normalize_name(user)?;
        session.create_user(&name)?;
        created_users.push(name);
    }
    let mut created_roles = Vec::with_capacity(roles.len());
    for role in &roles {
        let name = privsync::normalize_name(role)?;
        session.create_role(&name)?;
        created_roles.push(name);
    }

    let data = CatalogInitialized { file, users: created_users, roles: created_roles };
    envelope("init-catalog", data, Metadata::new(elapsed_ms(start)))
}
