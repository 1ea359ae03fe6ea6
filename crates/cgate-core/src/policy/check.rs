//! Import policy evaluation.
//!
//! `check` is a pure function of the decoded entries and the policy. Every
//! entry is evaluated, so a rejection always lists all offending imports
//! rather than only the first one.

use serde::{Deserialize, Serialize};

use crate::policy::model::ImportPolicy;
use crate::wasm::sections::ImportEntry;

/// Outcome of checking a module's imports against a policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Allowed,
    Rejected { violations: Vec<ImportEntry> },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn violations(&self) -> &[ImportEntry] {
        match self {
            Self::Allowed => &[],
            Self::Rejected { violations } => violations,
        }
    }
}

/// Evaluate `entries` against `policy`.
///
/// Matching uses `(module, field)` only; the import kind is ignored.
/// Violations keep input order and duplicates.
pub fn check(entries: &[ImportEntry], policy: &ImportPolicy) -> Verdict {
    let violations: Vec<ImportEntry> = entries
        .iter()
        .filter(|entry| !policy.permits(&entry.module, &entry.field))
        .cloned()
        .collect();

    if violations.is_empty() {
        Verdict::Allowed
    } else {
        Verdict::Rejected { violations }
    }
}
