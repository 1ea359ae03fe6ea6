use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Host module every contract may import from under the default policy.
pub const DEFAULT_HOST_MODULE: &str = "env";

/// One permitted host import.
///
/// With `field` unset the rule admits every field of `module`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyRule {
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl PolicyRule {
    pub fn exact(module: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            field: Some(field.into()),
        }
    }

    pub fn any_field(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            field: None,
        }
    }

    pub fn matches(&self, module: &str, field: &str) -> bool {
        self.module == module && self.field.as_deref().is_none_or(|f| f == field)
    }
}

impl std::fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}", self.module, field),
            None => write!(f, "{}.*", self.module),
        }
    }
}

/// The host capability surface a contract may depend on.
///
/// Built once per invocation and never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportPolicy {
    allow: Vec<PolicyRule>,
}

impl ImportPolicy {
    pub fn new(allow: Vec<PolicyRule>) -> Self {
        Self { allow }
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.allow
    }

    pub fn permits(&self, module: &str, field: &str) -> bool {
        self.allow.iter().any(|rule| rule.matches(module, field))
    }

    /// Parse a JSON policy document: `{"allow": [{"module": "env"}]}`.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid import policy document")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read policy file: {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in policy file {}", path.display()))
    }
}

impl Default for ImportPolicy {
    /// Admit the host API module and nothing else. WASI and any other
    /// system interface are rejected.
    fn default() -> Self {
        Self::new(vec![PolicyRule::any_field(DEFAULT_HOST_MODULE)])
    }
}
