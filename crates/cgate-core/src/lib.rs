pub mod error;
pub mod pipeline;
pub mod policy;
pub mod project;
pub mod report;
pub mod scaffold;
pub mod util;
pub mod wasm;

use std::path::Path;

use anyhow::Result;

use crate::error::ModuleError;
use crate::policy::check::{Verdict, check};
use crate::policy::model::ImportPolicy;
use crate::report::model::{ToolInfo, ValidationReport};
use crate::wasm::sections::ImportEntry;

pub const TOOL_NAME: &str = "cgate";

/// Version of the JSON validation report layout.
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Decode a module's imports and check them against `policy`.
///
/// Pure: the same bytes and policy always give the same result.
pub fn validate_bytes(
    bytes: &[u8],
    policy: &ImportPolicy,
) -> Result<(Vec<ImportEntry>, Verdict), ModuleError> {
    let entries = wasm::imports::locate_imports(bytes)?;
    let verdict = check(&entries, policy);
    Ok((entries, verdict))
}

/// Run the import gate on an artifact already on disk.
pub fn inspect(path: &Path, policy: &ImportPolicy, tool: ToolInfo) -> Result<ValidationReport> {
    let module = wasm::read::read_artifact(path)?;
    let (entries, verdict) = validate_bytes(&module.bytes, policy)?;

    Ok(ValidationReport::new(
        tool,
        module.into_artifact(),
        policy.rules().to_vec(),
        entries,
        verdict,
    ))
}
