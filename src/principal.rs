//! Principals
//!
//! A principal is the schema (user) or role whose privileges are reconciled.
//! Exactly one kind is selected per call; the tagged union makes "both" and
//! "neither" unrepresentable once a `Principal` exists.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PrivsyncError, Result};
use crate::normalize::normalize_name;

/// Principal kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    /// A schema / database user
    Schema,
    /// A role
    Role,
}

impl PrincipalKind {
    /// Lower-case name used in output
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Role => "role",
        }
    }

    /// Capitalized name used at the start of messages
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Schema => "Schema",
            Self::Role => "Role",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated principal with a canonical (upper-case) name
///
/// Deserialization goes through [`Principal::new`], so a decoded value is as
/// trustworthy as a constructed one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase", try_from = "RawPrincipal")]
pub enum Principal {
    /// A schema / database user
    Schema(String),
    /// A role
    Role(String),
}

/// Wire form of a principal before name normalization
#[derive(Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
enum RawPrincipal {
    Schema(String),
    Role(String),
}

impl TryFrom<RawPrincipal> for Principal {
    type Error = PrivsyncError;

    fn try_from(raw: RawPrincipal) -> Result<Self> {
        match raw {
            RawPrincipal::Schema(name) => Self::new(PrincipalKind::Schema, &name),
            RawPrincipal::Role(name) => Self::new(PrincipalKind::Role, &name),
        }
    }
}

impl Principal {
    /// Create a principal of the given kind, normalizing the name
    pub fn new(kind: PrincipalKind, raw_name: &str) -> Result<Self> {
        let name = normalize_name(raw_name)?;
        Ok(match kind {
            PrincipalKind::Schema => Self::Schema(name),
            PrincipalKind::Role => Self::Role(name),
        })
    }

    /// Create a principal from the two mutually exclusive optional inputs
    ///
    /// Exactly one of `schema` / `role` must be supplied.
    pub fn from_selection(schema: Option<&str>, role: Option<&str>) -> Result<Self> {
        match (schema, role) {
            (Some(name), None) => Self::new(PrincipalKind::Schema, name),
            (None, Some(name)) => Self::new(PrincipalKind::Role, name),
            (Some(_), Some(_)) => {
                Err(PrivsyncError::validation("Specify either a schema or a role, not both"))
            }
            (None, None) => Err(PrivsyncError::validation("A schema or a role name is required")),
        }
    }

    /// The principal kind
    #[must_use]
    pub const fn kind(&self) -> PrincipalKind {
        match self {
            Self::Schema(_) => PrincipalKind::Schema,
            Self::Role(_) => PrincipalKind::Role,
        }
    }

    /// The canonical name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Schema(name) | Self::Role(name) => name,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.name())
    }
}
