//! Configuration Management
//!
//! This module handles loading and saving named dictionary connections.
//!
//! # Configuration Locations
//! - Local: `.privsync/config.json` (team-shareable, per-project)
//! - Global: `~/.config/privsync/connections.json` (per-user)
//!
//! # Resolution Precedence
//! 1. Explicit `--file` on the command line (highest priority)
//! 2. Local config file (`.privsync/config.json`)
//! 3. Global config file (`~/.config/privsync/connections.json`)
//!
//! # Format
//! Both files share one format:
//! ```json
//! {
//!   "connections": {
//!     "dev": { "file": "dev.db", "timeout_ms": 5000 },
//!     "prod": { "file": "/srv/dict.db", "readonly": true }
//!   },
//!   "default": "dev"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::engine::ConnectionConfig;
use crate::error::{PrivsyncError, Result};

/// Named connections plus a default pointer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRegistry {
    /// Named connections
    #[serde(default)]
    pub connections: BTreeMap<String, StoredConnection>,

    /// Name of the default connection (must exist in connections map)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ConnectionRegistry {
    /// Overlay `other` on top of `self`; entries in `other` win
    #[must_use]
    pub fn merged_with(mut self, other: Self) -> Self {
        self.connections.extend(other.connections);
        if other.default.is_some() {
            self.default = other.default;
        }
        self
    }

    /// Look up a connection by name, or the default when `name` is None
    ///
    /// Returns a tuple of (`ConnectionConfig`, `is_readonly`).
    pub fn resolve(&self, name: Option<&str>) -> Result<(ConnectionConfig, bool)> {
        let available = || self.connections.keys().cloned().collect::<Vec<_>>();

        let conn_name = match name {
            Some(n) => n,
            None => self.default.as_deref().ok_or_else(|| {
                PrivsyncError::config_error(format!(
                    "No default connection set. Available connections: {:?}. \
                     Specify one with --connection or pass --file.",
                    available()
                ))
            })?,
        };

        let stored = self.connections.get(conn_name).ok_or_else(|| {
            PrivsyncError::config_error(format!(
                "Connection '{conn_name}' not found. Available connections: {:?}",
                available()
            ))
        })?;

        Ok(stored.resolve())
    }
}

/// Stored connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConnection {
    /// Connection configuration
    #[serde(flatten)]
    pub config: ConnectionConfig,

    /// Whether this connection is readonly (plans are reported, never applied)
    /// Default: false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
}

impl StoredConnection {
    /// Return the `ConnectionConfig` and readonly flag
    #[must_use]
    pub fn resolve(&self) -> (ConnectionConfig, bool) {
        (self.config.clone(), self.readonly.unwrap_or(false))
    }
}

/// Configuration file location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Local config: `.privsync/config.json` (team-shareable)
    Local,
    /// Global config: `~/.config/privsync/connections.json` (per-user)
    Global,
}

impl ConfigLocation {
    /// Path of the config file for this location
    pub fn path(self) -> Result<PathBuf> {
        match self {
            Self::Local => local_config_path(),
            Self::Global => global_config_path(),
        }
    }
}

/// Get path to local config file (`.privsync/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        PrivsyncError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".privsync").join("config.json"))
}

/// Get path to global config file (`~/.config/privsync/connections.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| PrivsyncError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("privsync").join("connections.json"))
}

/// Load a registry from a config file
///
/// A missing file is an empty registry.
pub fn load_registry(path: &Path) -> Result<ConnectionRegistry> {
    if !path.exists() {
        return Ok(ConnectionRegistry::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| PrivsyncError::config_error(format!("Could not read config file: {e}")))?;

    serde_json::from_str(&contents).map_err(|e| {
        PrivsyncError::config_error(format!(
            "Invalid config file format in {}: {e}",
            path.display()
        ))
    })
}

/// Save a registry to a config file, creating parent directories as needed
pub fn save_registry(path: &Path, registry: &ConnectionRegistry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            PrivsyncError::config_error(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(registry)
        .map_err(|e| PrivsyncError::config_error(format!("Could not serialize config: {e}")))?;

    fs::write(path, contents)
        .map_err(|e| PrivsyncError::config_error(format!("Could not write config file: {e}")))?;

    debug!(path = %path.display(), connections = registry.connections.len(), "saved config");
    Ok(())
}

/// Load the merged registry from a local and a global file (local wins)
pub fn load_merged(local: &Path, global: &Path) -> Result<ConnectionRegistry> {
    let global_registry = load_registry(global)?;
    let local_registry = load_registry(local)?;
    Ok(global_registry.merged_with(local_registry))
}

/// Load the merged registry from the standard locations
pub fn load_with_precedence() -> Result<ConnectionRegistry> {
    load_merged(&local_config_path()?, &global_config_path()?)
}

/// Resolve a connection by name (or the default) from the standard locations
///
/// Returns a tuple of (`ConnectionConfig`, `is_readonly`).
pub fn resolve_connection(name: Option<&str>) -> Result<(ConnectionConfig, bool)> {
    load_with_precedence()?.resolve(name)
}

/// Add or replace a named connection in a config file
///
/// The first connection saved to a file becomes its default.
pub fn save_connection_to(
    path: &Path,
    name: &str,
    config: ConnectionConfig,
    readonly: bool,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PrivsyncError::config_error("Connection name cannot be empty"));
    }

    let mut registry = load_registry(path)?;
    let is_first_connection = registry.connections.is_empty();

    registry
        .connections
        .insert(name.to_string(), StoredConnection { config, readonly: readonly.then_some(true) });

    if is_first_connection || registry.default.is_none() {
        registry.default = Some(name.to_string());
    }

    save_registry(path, &registry)
}

/// Add or replace a named connection at a standard location
pub fn save_connection(
    name: &str,
    config: ConnectionConfig,
    readonly: bool,
    location: ConfigLocation,
) -> Result<PathBuf> {
    let path = location.path()?;
    save_connection_to(&path, name, config, readonly)?;
    Ok(path)
}

/// List all available connections from the standard locations
///
/// Returns a Vec of tuples: (`connection_name`, config, `is_readonly`)
pub fn list_connections() -> Result<Vec<(String, ConnectionConfig, bool)>> {
    let registry = load_with_precedence()?;
    Ok(registry
        .connections
        .iter()
        .map(|(name, stored)| {
            let (config, readonly) = stored.resolve();
            (name.clone(), config, readonly)
        })
        .collect())
}
