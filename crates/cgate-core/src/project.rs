//! Project descriptor (`Cargo.toml`) handling.
//!
//! The descriptor is read once, before any pipeline stage runs. Any problem
//! here is a precondition failure rather than a stage failure.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::BuildError;
use crate::policy::model::ImportPolicy;

pub const MANIFEST_FILE: &str = "Cargo.toml";

/// Directory under the project root that receives build output.
pub const TARGET_DIR: &str = "target";

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
    #[serde(default)]
    metadata: Option<PackageMetadata>,
}

#[derive(Debug, Deserialize)]
struct PackageMetadata {
    cgate: Option<ImportPolicy>,
}

/// A contract project on disk.
#[derive(Debug, Clone)]
pub struct Project {
    /// Absolute project directory.
    pub root: PathBuf,
    pub package_name: String,
    /// Import policy declared under `[package.metadata.cgate]`, if any.
    pub policy: Option<ImportPolicy>,
}

impl Project {
    pub fn load(dir: &Path) -> Result<Self, BuildError> {
        let root = std::path::absolute(dir).map_err(|e| {
            BuildError::Precondition(format!(
                "cannot resolve project directory {}: {e}",
                dir.display()
            ))
        })?;
        let manifest_path = root.join(MANIFEST_FILE);

        if !manifest_path.is_file() {
            return Err(BuildError::Precondition(format!(
                "{MANIFEST_FILE} not found in {}",
                root.display()
            )));
        }

        let text = fs::read_to_string(&manifest_path).map_err(|e| {
            BuildError::Precondition(format!("failed to read {}: {e}", manifest_path.display()))
        })?;

        let project = Self::from_manifest_str(&text, root)?;
        debug!(package = %project.package_name, root = %project.root.display(), "project loaded");
        Ok(project)
    }

    fn from_manifest_str(text: &str, root: PathBuf) -> Result<Self, BuildError> {
        let manifest: Manifest = toml::from_str(text)
            .map_err(|e| BuildError::Precondition(format!("malformed {MANIFEST_FILE}: {e}")))?;

        let package = manifest.package.ok_or_else(|| {
            BuildError::Precondition(format!("package section not found in {MANIFEST_FILE}"))
        })?;

        Ok(Self {
            root,
            package_name: package.name,
            policy: package.metadata.and_then(|m| m.cgate),
        })
    }

    /// Name cargo gives the compiled library artifact.
    pub fn crate_name(&self) -> String {
        self.package_name.replace('-', "_")
    }

    pub fn target_dir(&self) -> PathBuf {
        self.root.join(TARGET_DIR)
    }
}
