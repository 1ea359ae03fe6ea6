use serde::{Deserialize, Serialize};

use crate::SCHEMA_VERSION;
use crate::policy::check::Verdict;
use crate::policy::model::PolicyRule;
use crate::wasm::sections::ImportEntry;

/// Result of running the import gate on one artifact.
///
/// Serialized as the JSON output of `check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub schema_version: String,
    pub tool: ToolInfo,
    pub artifact: ArtifactInfo,
    pub policy: Vec<PolicyRule>,
    pub imports: Vec<ImportEntry>,
    pub verdict: Verdict,
    pub exit_code: i32,
}

impl ValidationReport {
    pub fn new(
        tool: ToolInfo,
        artifact: ArtifactInfo,
        policy: Vec<PolicyRule>,
        imports: Vec<ImportEntry>,
        verdict: Verdict,
    ) -> Self {
        let exit_code = if verdict.is_allowed() {
            0
        } else {
            crate::error::INTERNAL_EXIT_CODE
        };

        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            tool,
            artifact,
            policy,
            imports,
            verdict,
            exit_code,
        }
    }
}

/// Tool metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

/// Artifact metadata bound to this report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: Option<String>,
    pub size_bytes: u64,
    pub hash: ArtifactHash,
}

/// Cryptographic artifact fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHash {
    pub algorithm: String,
    pub value: String,
}
