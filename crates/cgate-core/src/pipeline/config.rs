use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::policy::model::ImportPolicy;
use crate::project::Project;

/// Link-time stack size used when the operator does not pass one.
pub const DEFAULT_STACK_SIZE: u32 = 8192;

/// Compilation target for contracts.
pub const DEFAULT_TARGET_TRIPLE: &str = "wasm32-wasip1";

/// Compiler profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    Debug,
    #[default]
    Release,
}

impl Profile {
    /// Directory cargo writes this profile's output to.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }
}

/// Everything the pipeline needs for one invocation.
///
/// Computed once up front; stages only read it.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub project: Project,
    pub profile: Profile,
    pub stack_size: u32,
    pub target_triple: String,
    pub policy: ImportPolicy,
    /// Resolved size optimizer executable, `None` when not installed.
    pub optimizer: Option<PathBuf>,
}

impl BuildConfig {
    /// Defaults for `project`. The project's declared policy, if any,
    /// replaces the built-in one.
    pub fn new(project: Project) -> Self {
        let policy = project.policy.clone().unwrap_or_default();
        Self {
            project,
            profile: Profile::default(),
            stack_size: DEFAULT_STACK_SIZE,
            target_triple: DEFAULT_TARGET_TRIPLE.to_string(),
            policy,
            optimizer: None,
        }
    }

    /// Replace the policy with one read from `path`.
    ///
    /// An operator-supplied file takes precedence over both the project's
    /// `[package.metadata.cgate]` table and the built-in default.
    pub fn with_policy_file(mut self, path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            self.policy = ImportPolicy::from_file(path)?;
        }
        Ok(self)
    }

    pub fn target_dir(&self) -> PathBuf {
        self.project.target_dir()
    }

    /// Artifact as emitted by the compiler.
    pub fn raw_artifact_path(&self) -> PathBuf {
        self.target_dir()
            .join(&self.target_triple)
            .join(self.profile.dir_name())
            .join(format!("{}.wasm", self.project.crate_name()))
    }

    /// Published artifact, written only after the gate passes.
    pub fn final_artifact_path(&self) -> PathBuf {
        self.target_dir()
            .join(format!("{}.wasm", self.project.crate_name()))
    }

    pub fn abi_path(&self) -> PathBuf {
        self.target_dir()
            .join(format!("{}.abi", self.project.package_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::model::PolicyRule;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn project(policy: Option<ImportPolicy>) -> Project {
        Project {
            root: PathBuf::from("/work/hello-token"),
            package_name: "hello-token".into(),
            policy,
        }
    }

    #[test]
    fn artifact_paths_follow_cargo_layout() {
        let mut config = BuildConfig::new(project(None));

        assert_eq!(
            config.raw_artifact_path(),
            PathBuf::from("/work/hello-token/target/wasm32-wasip1/release/hello_token.wasm")
        );
        assert_eq!(
            config.final_artifact_path(),
            PathBuf::from("/work/hello-token/target/hello_token.wasm")
        );
        assert_eq!(
            config.abi_path(),
            PathBuf::from("/work/hello-token/target/hello-token.abi")
        );

        config.profile = Profile::Debug;
        assert!(config.raw_artifact_path().ends_with("wasm32-wasip1/debug/hello_token.wasm"));
    }

    #[test]
    fn project_policy_replaces_default() {
        let declared = ImportPolicy::new(vec![PolicyRule::exact("env", "approved_log")]);

        assert_eq!(BuildConfig::new(project(None)).policy, ImportPolicy::default());
        assert_eq!(BuildConfig::new(project(Some(declared.clone()))).policy, declared);
    }

    #[test]
    fn policy_file_overrides_project_policy() {
        let declared = ImportPolicy::new(vec![PolicyRule::exact("env", "approved_log")]);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"allow": [{"module": "wasi_snapshot_preview1", "field": "fd_write"}]}"#)
            .unwrap();

        let config = BuildConfig::new(project(Some(declared)))
            .with_policy_file(Some(file.path()))
            .unwrap();

        assert_eq!(
            config.policy,
            ImportPolicy::new(vec![PolicyRule::exact("wasi_snapshot_preview1", "fd_write")])
        );
        assert!(!config.policy.permits("env", "approved_log"));
    }

    #[test]
    fn absent_policy_file_keeps_project_policy() {
        let declared = ImportPolicy::new(vec![PolicyRule::exact("env", "approved_log")]);

        let config = BuildConfig::new(project(Some(declared.clone())))
            .with_policy_file(None)
            .unwrap();

        assert_eq!(config.policy, declared);
    }

    #[test]
    fn unreadable_policy_file_is_an_error() {
        let err = BuildConfig::new(project(None))
            .with_policy_file(Some(Path::new("/nonexistent/policy.json")))
            .unwrap_err();

        assert!(err.to_string().contains("failed to read policy file"));
    }
}
