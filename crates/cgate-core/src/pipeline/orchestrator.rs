//! Build orchestration.
//!
//! The pipeline is a small state machine:
//!
//! ```text
//! Idle -> Compiling -> Validating -> Optimizing -> GeneratingAbi -> Done
//!   \________________________________________________/
//!                (GenerateAbi request)
//! ```
//!
//! Any non-terminal state may move to `Aborted`, which is absorbing. Stages
//! run strictly one after another; a failed stage means no later stage is
//! ever started.

use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::error::BuildError;
use crate::pipeline::abi;
use crate::pipeline::compile::compile_command;
use crate::pipeline::config::BuildConfig;
use crate::pipeline::optimize::{fallback_copy, optimize_command};
use crate::pipeline::stage::{Stage, StageResult, StageRunner, run_stage};
use crate::policy::check::{Verdict, check};
use crate::wasm::imports::locate_imports;
use crate::wasm::read::read_artifact;

/// What the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildRequest {
    /// Compile, validate, optimize and generate the ABI.
    Build,
    /// Compile, validate and optimize.
    BuildContract,
    /// Generate the ABI only.
    GenerateAbi,
}

#[derive(Debug)]
pub enum PipelineState {
    Idle,
    Compiling,
    Validating,
    Optimizing,
    GeneratingAbi,
    Done,
    Aborted { stage: Stage, reason: BuildError },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Compiling => "compiling",
            Self::Validating => "validating",
            Self::Optimizing => "optimizing",
            Self::GeneratingAbi => "generating-abi",
            Self::Done => "done",
            Self::Aborted { .. } => "aborted",
        }
    }
}

/// Non-fatal conditions the operator should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// No size optimizer was found; the raw artifact was published as-is.
    OptimizerUnavailable { published: PathBuf },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OptimizerUnavailable { published } => write!(
                f,
                "size optimizer unavailable; unoptimized artifact copied to {}",
                published.display()
            ),
        }
    }
}

/// Terminal result of one pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// `Done` or `Aborted`.
    pub state: PipelineState,
    /// Names of every state visited, in order.
    pub trace: Vec<&'static str>,
    pub advisories: Vec<Advisory>,
    /// Published contract artifact, if the optimize stage completed.
    pub artifact: Option<PathBuf>,
    /// Interface description, if the ABI stage completed.
    pub abi: Option<PathBuf>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.state, PipelineState::Done)
    }

    /// Exit status for the whole process.
    pub fn exit_code(&self) -> i32 {
        match &self.state {
            PipelineState::Aborted { reason, .. } => reason.exit_code(),
            _ => 0,
        }
    }

    pub fn failure(&self) -> Option<(Stage, &BuildError)> {
        match &self.state {
            PipelineState::Aborted { stage, reason } => Some((*stage, reason)),
            _ => None,
        }
    }
}

/// Drives one request through the pipeline.
pub struct Orchestrator<'a, R: StageRunner> {
    config: &'a BuildConfig,
    runner: R,
    request: BuildRequest,
    state: PipelineState,
    trace: Vec<&'static str>,
    advisories: Vec<Advisory>,
    artifact: Option<PathBuf>,
    abi: Option<PathBuf>,
}

impl<'a, R: StageRunner> Orchestrator<'a, R> {
    pub fn new(config: &'a BuildConfig, runner: R, request: BuildRequest) -> Self {
        Self {
            config,
            runner,
            request,
            state: PipelineState::Idle,
            trace: vec![PipelineState::Idle.name()],
            advisories: Vec::new(),
            artifact: None,
            abi: None,
        }
    }

    /// Run to a terminal state.
    pub fn run(mut self) -> PipelineOutcome {
        while !self.state.is_terminal() {
            let current = std::mem::replace(&mut self.state, PipelineState::Idle);
            let from = current.name();
            let next = self.step(current);
            info!(from, to = next.name(), "pipeline transition");
            self.trace.push(next.name());
            self.state = next;
        }

        PipelineOutcome {
            state: self.state,
            trace: self.trace,
            advisories: self.advisories,
            artifact: self.artifact,
            abi: self.abi,
        }
    }

    fn step(&mut self, state: PipelineState) -> PipelineState {
        match state {
            PipelineState::Idle => match self.request {
                BuildRequest::GenerateAbi => PipelineState::GeneratingAbi,
                BuildRequest::Build | BuildRequest::BuildContract => PipelineState::Compiling,
            },
            PipelineState::Compiling => self.compile(),
            PipelineState::Validating => self.validate(),
            PipelineState::Optimizing => self.optimize(),
            PipelineState::GeneratingAbi => self.generate_abi(),
            terminal @ (PipelineState::Done | PipelineState::Aborted { .. }) => terminal,
        }
    }

    fn compile(&mut self) -> PipelineState {
        let command = compile_command(self.config);
        match run_stage(&mut self.runner, &command, &self.config.raw_artifact_path()) {
            StageResult::Success { .. } => PipelineState::Validating,
            StageResult::Failure {
                exit_code,
                stderr_excerpt,
            } => abort(
                Stage::Compile,
                BuildError::StageProcess {
                    tool: command.program,
                    exit_code,
                    stderr_excerpt,
                },
            ),
        }
    }

    fn validate(&mut self) -> PipelineState {
        let path = self.config.raw_artifact_path();
        let module = match read_artifact(&path) {
            Ok(module) => module,
            Err(err) => {
                return abort(
                    Stage::Validate,
                    BuildError::Artifact {
                        path,
                        reason: format!("{err:#}"),
                    },
                );
            }
        };
        info!(
            path = %path.display(),
            size = module.size_bytes(),
            sha256 = %module.sha256_hex,
            "validating imports"
        );

        let entries = match locate_imports(&module.bytes) {
            Ok(entries) => entries,
            Err(err) => return abort(Stage::Validate, err.into()),
        };

        match check(&entries, &self.config.policy) {
            Verdict::Allowed => {
                info!(imports = entries.len(), "import policy satisfied");
                PipelineState::Optimizing
            }
            Verdict::Rejected { violations } => {
                abort(Stage::Validate, BuildError::PolicyViolation { violations })
            }
        }
    }

    fn optimize(&mut self) -> PipelineState {
        let input = self.config.raw_artifact_path();
        let output = self.config.final_artifact_path();

        match &self.config.optimizer {
            Some(optimizer) => {
                let command = optimize_command(optimizer, &input, &output);
                if let StageResult::Failure {
                    exit_code,
                    stderr_excerpt,
                } = run_stage(&mut self.runner, &command, &output)
                {
                    return abort(
                        Stage::Optimize,
                        BuildError::StageProcess {
                            tool: command.program,
                            exit_code,
                            stderr_excerpt,
                        },
                    );
                }
            }
            None => {
                if let Err(err) = fallback_copy(&input, &output) {
                    return abort(
                        Stage::Optimize,
                        BuildError::Artifact {
                            path: output,
                            reason: format!("failed to publish unoptimized artifact: {err}"),
                        },
                    );
                }
                info!(
                    path = %output.display(),
                    "optimizer unavailable, published unoptimized artifact"
                );
                self.advisories.push(Advisory::OptimizerUnavailable {
                    published: output.clone(),
                });
            }
        }

        self.artifact = Some(output);
        match self.request {
            BuildRequest::Build => PipelineState::GeneratingAbi,
            BuildRequest::BuildContract | BuildRequest::GenerateAbi => PipelineState::Done,
        }
    }

    fn generate_abi(&mut self) -> PipelineState {
        match abi::generate_abi(&mut self.runner, self.config) {
            StageResult::Success { output_path } => {
                self.abi = Some(output_path);
                PipelineState::Done
            }
            StageResult::Failure {
                exit_code,
                stderr_excerpt,
            } => abort(
                Stage::GenerateAbi,
                BuildError::StageProcess {
                    tool: abi::ABIGEN_PACKAGE.to_string(),
                    exit_code,
                    stderr_excerpt,
                },
            ),
        }
    }
}

fn abort(stage: Stage, reason: BuildError) -> PipelineState {
    info!(%stage, %reason, "pipeline aborted");
    PipelineState::Aborted { stage, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::INTERNAL_EXIT_CODE;
    use crate::pipeline::stage::{CommandSpec, ProcessExit};
    use crate::policy::model::{ImportPolicy, PolicyRule};
    use crate::project::Project;
    use std::fs;
    use std::io;
    use tempfile::{TempDir, tempdir};

    /// Stands in for cargo and wasm-opt. The compile step writes `module`
    /// to the raw artifact path, the optimize step copies input to output.
    struct FakeTools {
        module: Vec<u8>,
        compile_exit: i32,
        optimize_exit: i32,
        abi_exit: i32,
        calls: Vec<String>,
        raw_path: PathBuf,
    }

    impl FakeTools {
        fn new(config: &BuildConfig, module: Vec<u8>) -> Self {
            Self {
                module,
                compile_exit: 0,
                optimize_exit: 0,
                abi_exit: 0,
                calls: Vec::new(),
                raw_path: config.raw_artifact_path(),
            }
        }
    }

    impl StageRunner for FakeTools {
        fn run(&mut self, command: &CommandSpec) -> io::Result<ProcessExit> {
            let exit = if command.args.first().map(String::as_str) == Some("build") {
                self.calls.push("compile".into());
                if self.compile_exit == 0 {
                    fs::create_dir_all(self.raw_path.parent().unwrap())?;
                    fs::write(&self.raw_path, &self.module)?;
                }
                self.compile_exit
            } else if command.args.first().map(String::as_str) == Some("run") {
                self.calls.push("abi".into());
                self.abi_exit
            } else {
                self.calls.push("optimize".into());
                if self.optimize_exit == 0 {
                    let out = command.args.last().unwrap();
                    fs::copy(&command.args[0], out)?;
                }
                self.optimize_exit
            };

            Ok(if exit == 0 {
                ProcessExit::success()
            } else {
                ProcessExit::failed(exit, "tool failed")
            })
        }
    }

    fn project_config(policy: ImportPolicy, optimizer: bool) -> (TempDir, BuildConfig) {
        let dir = tempdir().unwrap();
        let mut config = BuildConfig::new(Project {
            root: dir.path().to_path_buf(),
            package_name: "token".into(),
            policy: None,
        });
        config.policy = policy;
        config.optimizer = optimizer.then(|| PathBuf::from("wasm-opt"));
        (dir, config)
    }

    fn approved_log_policy() -> ImportPolicy {
        ImportPolicy::new(vec![PolicyRule::exact("env", "approved_log")])
    }

    fn module(wat: &str) -> Vec<u8> {
        wat::parse_str(wat).unwrap()
    }

    fn approved_module() -> Vec<u8> {
        module(r#"(module (import "env" "approved_log" (func)))"#)
    }

    #[test]
    fn approved_imports_build_to_done() {
        let (_dir, config) = project_config(approved_log_policy(), true);
        let mut tools = FakeTools::new(&config, approved_module());

        let outcome = Orchestrator::new(&config, &mut tools, BuildRequest::Build).run();

        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(
            outcome.trace,
            vec!["idle", "compiling", "validating", "optimizing", "generating-abi", "done"]
        );
        assert_eq!(tools.calls, vec!["compile", "optimize", "abi"]);
        assert!(config.final_artifact_path().is_file());
        assert_eq!(outcome.artifact, Some(config.final_artifact_path()));
        assert_eq!(outcome.abi, Some(config.abi_path()));
    }

    #[test]
    fn build_contract_skips_abi() {
        let (_dir, config) = project_config(approved_log_policy(), true);
        let mut tools = FakeTools::new(&config, approved_module());

        let outcome = Orchestrator::new(&config, &mut tools, BuildRequest::BuildContract).run();

        assert!(outcome.is_success());
        assert_eq!(tools.calls, vec!["compile", "optimize"]);
        assert!(outcome.abi.is_none());
    }

    #[test]
    fn compile_failure_stops_everything() {
        let (_dir, config) = project_config(approved_log_policy(), true);
        let mut tools = FakeTools::new(&config, approved_module());
        tools.compile_exit = 101;

        let outcome = Orchestrator::new(&config, &mut tools, BuildRequest::Build).run();

        assert_eq!(outcome.exit_code(), 101);
        assert_eq!(outcome.trace, vec!["idle", "compiling", "aborted"]);
        assert!(matches!(
            outcome.failure(),
            Some((Stage::Compile, BuildError::StageProcess { .. }))
        ));
        assert_eq!(tools.calls, vec!["compile"]);
        assert!(!config.final_artifact_path().exists());
    }

    /// Collects formatted log output for one test.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn aborts_and_advisories_stay_below_warn_level() {
        let (_dir, config) = project_config(ImportPolicy::default(), false);
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut failing = FakeTools::new(&config, approved_module());
            failing.compile_exit = 101;
            Orchestrator::new(&config, &mut failing, BuildRequest::Build).run();

            let mut unoptimized = FakeTools::new(&config, approved_module());
            let outcome =
                Orchestrator::new(&config, &mut unoptimized, BuildRequest::BuildContract).run();
            assert_eq!(outcome.advisories.len(), 1);
        });

        assert!(logs.0.lock().unwrap().is_empty());
    }

    #[test]
    fn wasi_import_is_rejected_without_artifact() {
        let (_dir, config) = project_config(approved_log_policy(), true);
        let wasm = module(
            r#"(module
                 (import "wasi_snapshot_preview1" "fd_write"
                   (func (param i32 i32 i32 i32) (result i32))))"#,
        );
        let mut tools = FakeTools::new(&config, wasm);

        let outcome = Orchestrator::new(&config, &mut tools, BuildRequest::Build).run();

        assert_eq!(outcome.exit_code(), INTERNAL_EXIT_CODE);
        match outcome.failure() {
            Some((Stage::Validate, BuildError::PolicyViolation { violations })) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].module, "wasi_snapshot_preview1");
                assert_eq!(violations[0].field, "fd_write");
            }
            other => panic!("expected policy violation, got {other:?}"),
        }
        assert_eq!(tools.calls, vec!["compile"]);
        assert!(!config.final_artifact_path().exists());
    }

    #[test]
    fn malformed_module_aborts_like_rejection() {
        let (_dir, config) = project_config(approved_log_policy(), true);
        let mut tools = FakeTools::new(&config, b"not wasm at all".to_vec());

        let outcome = Orchestrator::new(&config, &mut tools, BuildRequest::BuildContract).run();

        assert_eq!(outcome.exit_code(), INTERNAL_EXIT_CODE);
        assert!(matches!(
            outcome.failure(),
            Some((Stage::Validate, BuildError::MalformedModule(_)))
        ));
        assert!(!config.final_artifact_path().exists());
    }

    #[test]
    fn missing_optimizer_falls_back_to_copy() {
        let (_dir, config) = project_config(approved_log_policy(), false);
        let wasm = approved_module();
        let mut tools = FakeTools::new(&config, wasm.clone());

        let outcome = Orchestrator::new(&config, &mut tools, BuildRequest::Build).run();

        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(tools.calls, vec!["compile", "abi"]);
        assert_eq!(fs::read(config.final_artifact_path()).unwrap(), wasm);
        assert_eq!(
            outcome.advisories,
            vec![Advisory::OptimizerUnavailable {
                published: config.final_artifact_path()
            }]
        );
    }

    #[test]
    fn optimizer_failure_keeps_its_exit_code() {
        let (_dir, config) = project_config(approved_log_policy(), true);
        let mut tools = FakeTools::new(&config, approved_module());
        tools.optimize_exit = 3;

        let outcome = Orchestrator::new(&config, &mut tools, BuildRequest::Build).run();

        assert_eq!(outcome.exit_code(), 3);
        assert!(matches!(outcome.failure(), Some((Stage::Optimize, _))));
        assert_eq!(tools.calls, vec!["compile", "optimize"]);
    }

    #[test]
    fn generate_abi_runs_standalone() {
        let (_dir, config) = project_config(approved_log_policy(), true);
        let mut tools = FakeTools::new(&config, approved_module());

        let outcome = Orchestrator::new(&config, &mut tools, BuildRequest::GenerateAbi).run();

        assert!(outcome.is_success());
        assert_eq!(outcome.trace, vec!["idle", "generating-abi", "done"]);
        assert_eq!(tools.calls, vec!["abi"]);
    }

    #[test]
    fn abi_failure_aborts_after_artifact_published() {
        let (_dir, config) = project_config(approved_log_policy(), true);
        let mut tools = FakeTools::new(&config, approved_module());
        tools.abi_exit = 101;

        let outcome = Orchestrator::new(&config, &mut tools, BuildRequest::Build).run();

        assert_eq!(outcome.exit_code(), 101);
        assert!(matches!(outcome.failure(), Some((Stage::GenerateAbi, _))));
        assert!(outcome.artifact.is_some());
    }
}
