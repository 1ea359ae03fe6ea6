//! ABI generation stage.
//!
//! A throwaway companion crate is written into a scratch directory, built
//! against the contract and run to emit the interface description. The
//! scratch directory is owned by a [`TempDir`] and removed on every exit
//! path of [`generate_abi`].

use std::fs;
use std::io;
use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::INTERNAL_EXIT_CODE;
use crate::pipeline::compile::{RUSTC_BOOTSTRAP, RUSTFLAGS};
use crate::pipeline::config::BuildConfig;
use crate::pipeline::stage::{CommandSpec, StageResult, StageRunner, run_stage};
use crate::util::template::{literal_path, render};

const MANIFEST_TEMPLATE: &str = include_str!("../../templates/abigen/_Cargo.toml");
const MAIN_TEMPLATE: &str = include_str!("../../templates/abigen/main.rs");

/// Package name of the companion crate.
pub const ABIGEN_PACKAGE: &str = "abi-gen";

const SCRATCH_PREFIX: &str = "cgate-abigen-";

/// Write the companion crate into a fresh scratch directory.
pub fn materialize(config: &BuildConfig) -> io::Result<TempDir> {
    let scratch = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;

    let project_dir = literal_path(&config.project.root);
    let crate_name = config.project.crate_name();
    let wasm_path = literal_path(&config.final_artifact_path());
    let abi_path = literal_path(&config.abi_path());
    let vars = [
        ("package_name", config.project.package_name.as_str()),
        ("crate_name", crate_name.as_str()),
        ("project_dir", project_dir.as_str()),
        ("wasm_path", wasm_path.as_str()),
        ("abi_path", abi_path.as_str()),
    ];

    fs::write(scratch.path().join("Cargo.toml"), render(MANIFEST_TEMPLATE, &vars))?;
    fs::write(scratch.path().join("main.rs"), render(MAIN_TEMPLATE, &vars))?;

    debug!(scratch = %scratch.path().display(), "companion crate written");
    Ok(scratch)
}

/// Build-and-run command for the companion crate in `scratch`.
///
/// The compile stage's flags are removed so they cannot leak into a host
/// build that does not expect them.
pub fn abi_command(config: &BuildConfig, scratch: &Path) -> CommandSpec {
    CommandSpec::new("cargo")
        .args(["run", "--package", ABIGEN_PACKAGE])
        .arg(format!(
            "--manifest-path={}",
            literal_path(&scratch.join("Cargo.toml"))
        ))
        .arg(format!("--target-dir={}", literal_path(&config.target_dir())))
        .arg("--release")
        .current_dir(&config.project.root)
        .env_remove(RUSTFLAGS)
        .env_remove(RUSTC_BOOTSTRAP)
}

/// Run the ABI stage. Independent of the other stages.
pub fn generate_abi(runner: &mut dyn StageRunner, config: &BuildConfig) -> StageResult {
    let scratch = match materialize(config) {
        Ok(dir) => dir,
        Err(err) => {
            return StageResult::Failure {
                exit_code: INTERNAL_EXIT_CODE,
                stderr_excerpt: format!("failed to prepare ABI generator: {err}"),
            };
        }
    };

    let command = abi_command(config, scratch.path());
    let result = run_stage(runner, &command, &config.abi_path());

    // Dropping the guard would also remove it; closing surfaces errors.
    let scratch_path = scratch.path().to_path_buf();
    if let Err(err) = scratch.close() {
        warn!(
            scratch = %scratch_path.display(),
            error = %err,
            "failed to remove scratch directory"
        );
    }

    result
}
