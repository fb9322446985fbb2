//! Work units: the protein accessions a run analyzes.
//!
//! A unit is an opaque identifier. The only structure the pipeline relies on
//! is the accession grammar checked by [`WorkUnit::validate`], which stages
//! apply before issuing any network call.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

lazy_static! {
    /// UniProt accession grammar (anchored).
    static ref ACCESSION_PATTERN: Regex = Regex::new(
        r"^(?:[OPQ][0-9][A-Z0-9]{3}[0-9]|[A-NR-Z][0-9](?:[A-Z][A-Z0-9]{2}[0-9]){1,2})$"
    ).unwrap();

    /// Accession-shaped tokens inside free text.
    static ref ACCESSION_TOKEN: Regex = Regex::new(
        r"\b(?:[OPQ][0-9][A-Z0-9]{3}[0-9]|[A-NR-Z][0-9](?:[A-Z][A-Z0-9]{2}[0-9]){1,2})\b"
    ).unwrap();
}

/// Identifier failed the accession format check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid UniProt accession '{0}'")]
pub struct InvalidUnit(pub String);

/// A single subject of analysis (a UniProt accession).
///
/// Identifiers are trimmed and upper-cased on construction. Construction
/// never fails: malformed identifiers are carried as units so the `Fetch`
/// stage can report them as in-band validation failures.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkUnit(String);

impl WorkUnit {
    /// Create a unit from a raw identifier.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_ascii_uppercase())
    }

    /// The normalised identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the identifier against the accession grammar.
    pub fn validate(&self) -> Result<(), InvalidUnit> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(InvalidUnit(self.0.clone()))
        }
    }

    /// Whether the identifier is a well-formed accession.
    pub fn is_valid(&self) -> bool {
        ACCESSION_PATTERN.is_match(&self.0)
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkUnit {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for WorkUnit {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Extract accession-shaped tokens from free text, first occurrence first.
///
/// Used as the planner's last resort when no structured plan is available.
pub fn extract_accessions(text: &str) -> Vec<WorkUnit> {
    let mut seen: Vec<WorkUnit> = Vec::new();
    for m in ACCESSION_TOKEN.find_iter(text) {
        let unit = WorkUnit::new(m.as_str());
        if !seen.contains(&unit) {
            seen.push(unit);
        }
    }
    seen
}
