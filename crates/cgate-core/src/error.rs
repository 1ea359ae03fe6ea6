use std::path::PathBuf;

use thiserror::Error;

use crate::wasm::sections::ImportEntry;

/// Exit status used for failures that do not come from an external tool:
/// precondition errors, malformed modules and policy rejections.
pub const INTERNAL_EXIT_CODE: i32 = -1;

/// Failure to decode the binary module container.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("malformed module at byte offset {offset:#x}: {reason}")]
    Malformed { offset: usize, reason: String },
}

impl ModuleError {
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Self::Malformed { offset, .. } => *offset,
        }
    }
}

impl From<wasmparser::BinaryReaderError> for ModuleError {
    fn from(err: wasmparser::BinaryReaderError) -> Self {
        Self::malformed(err.offset(), err.message())
    }
}

/// Fatal build failures. Each one terminates the pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The project could not be set up before any stage ran.
    #[error("{0}")]
    Precondition(String),

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed with exit code {exit_code}")]
    StageProcess {
        tool: String,
        exit_code: i32,
        stderr_excerpt: String,
    },

    #[error(transparent)]
    MalformedModule(#[from] ModuleError),

    #[error("{} disallowed import(s) found", violations.len())]
    PolicyViolation { violations: Vec<ImportEntry> },

    /// A stage completed but its artifact could not be read or published.
    #[error("artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },
}

impl BuildError {
    /// Process exit status the CLI terminates with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StageProcess { exit_code, .. } => *exit_code,
            _ => INTERNAL_EXIT_CODE,
        }
    }
}
