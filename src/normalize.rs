//! Input Normalization
//!
//! Turns free-form principal names and privilege lists into canonical values.
//!
//! # Canonical Form
//! - Surrounding quotes (`'`, `"`) and brackets (`[`, `]`) are stripped
//! - Runs of whitespace collapse to a single space, ends are trimmed
//! - Everything is upper-cased; catalog results are folded the same way
//!
//! Normalizing an already-normalized value is a no-op.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{PrivsyncError, Result};

/// Words that open a GRANT/REVOKE clause; no system privilege name contains them
const CLAUSE_KEYWORDS: [&str; 5] = ["TO", "FROM", "WITH", "IDENTIFIED", "BY"];

/// A canonical, upper-cased system privilege or role name
///
/// Deserialized values are validated like caller input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Privilege(String);

impl Privilege {
    /// Normalize and validate a single privilege token
    ///
    /// Returns `Ok(None)` for tokens that are empty after cleaning.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let cleaned = clean_token(raw);
        if cleaned.is_empty() {
            return Ok(None);
        }
        if !is_identifier_like(&cleaned, true) {
            return Err(PrivsyncError::validation(format!("Invalid privilege name '{raw}'")));
        }
        if let Some(word) = cleaned.split(' ').find(|word| CLAUSE_KEYWORDS.contains(word)) {
            return Err(PrivsyncError::validation(format!(
                "Invalid privilege name '{raw}': '{word}' is a statement keyword"
            )));
        }
        Ok(Some(Self(cleaned)))
    }

    /// Fold a value read from the catalog into canonical form
    ///
    /// Catalog values are trusted, so only case and whitespace are normalized.
    #[must_use]
    pub fn from_catalog(value: &str) -> Self {
        Self(clean_token(value))
    }

    /// The canonical text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Privilege {
    type Error = PrivsyncError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)?.ok_or_else(|| PrivsyncError::validation("Privilege name cannot be empty"))
    }
}

impl From<Privilege> for String {
    fn from(privilege: Privilege) -> Self {
        privilege.0
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered set of privileges
///
/// Ordering is lexical so planned statements are deterministic.
pub type PrivilegeSet = BTreeSet<Privilege>;

/// Build a privilege set from already-canonical literals
///
/// Intended for constants and tests; each literal is folded but not validated.
pub fn privilege_set<'a>(items: impl IntoIterator<Item = &'a str>) -> PrivilegeSet {
    items.into_iter().map(Privilege::from_catalog).collect()
}

/// Normalize a list of raw grant strings into a privilege set
///
/// Each entry may itself be a comma-separated or bracketed list
/// (`"['connect', 'resource']"`). Duplicates collapse; empty input yields an empty set.
pub fn normalize_list<S: AsRef<str>>(raw: &[S]) -> Result<PrivilegeSet> {
    let mut set = PrivilegeSet::new();
    for entry in raw {
        for token in entry.as_ref().split(',') {
            if let Some(privilege) = Privilege::parse(token)? {
                set.insert(privilege);
            }
        }
    }
    Ok(set)
}

/// Normalize a principal name
///
/// Fails when the name is empty after cleaning or contains characters that are not
/// valid in an unquoted identifier.
pub fn normalize_name(raw: &str) -> Result<String> {
    let cleaned = clean_token(raw);
    if cleaned.is_empty() {
        return Err(PrivsyncError::validation("Principal name cannot be empty"));
    }
    if !is_identifier_like(&cleaned, false) {
        return Err(PrivsyncError::validation(format!("Invalid principal name '{raw}'")));
    }
    Ok(cleaned)
}

fn clean_token(raw: &str) -> String {
    let stripped: String =
        raw.chars().filter(|c| !matches!(c, '\'' | '"' | '[' | ']')).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

// Unquoted identifier characters; privileges such as CREATE SESSION also carry spaces
fn is_identifier_like(value: &str, allow_spaces: bool) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphabetic()
        && chars.all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#') || (allow_spaces && c == ' ')
        })
}
