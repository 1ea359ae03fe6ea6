use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cgate_core::error::INTERNAL_EXIT_CODE;
use cgate_core::pipeline::config::{BuildConfig, Profile};
use cgate_core::pipeline::optimize::find_optimizer;
use cgate_core::pipeline::orchestrator::{BuildRequest, Orchestrator};
use cgate_core::pipeline::stage::ProcessRunner;
use cgate_core::policy::model::ImportPolicy;
use cgate_core::project::Project;
use cgate_core::report::{model::ToolInfo, render};
use cgate_core::{TOOL_NAME, inspect, scaffold};

mod args;
mod output;

use args::{BuildArgs, Command, OutputFormat};

fn main() {
    let args = args::Args::parse();
    init_tracing(args.verbose);

    let code = match run(args.command) {
        Ok(code) => code,
        Err(err) => {
            output::error(&format!("{err:#}"));
            INTERNAL_EXIT_CODE
        }
    };

    std::process::exit(code);
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Command) -> Result<i32> {
    match command {
        Command::Init { project_name } => {
            let cwd = std::env::current_dir().context("cannot determine working directory")?;
            let root = scaffold::init_project(&cwd, &project_name)?;
            output::success(&format!("created project {project_name}"));
            output::path("directory", &root);
            Ok(0)
        }
        Command::Build(build) => run_pipeline(&build, BuildRequest::Build),
        Command::BuildContract(build) => run_pipeline(&build, BuildRequest::BuildContract),
        Command::GenerateAbi { dir_name } => {
            let config = BuildConfig::new(Project::load(&dir_name)?);
            Ok(drive(&config, BuildRequest::GenerateAbi))
        }
        Command::Check {
            wasm_path,
            policy,
            format,
        } => check(&wasm_path, policy.as_deref(), format),
    }
}

fn run_pipeline(build: &BuildArgs, request: BuildRequest) -> Result<i32> {
    let project = Project::load(&build.dir_name)?;
    let mut config = BuildConfig::new(project).with_policy_file(build.policy.as_deref())?;

    if build.debug {
        config.profile = Profile::Debug;
    }
    config.stack_size = build.stack_size;
    config.target_triple = build.target.clone();
    config.optimizer = find_optimizer(std::env::var_os("PATH").as_deref());

    Ok(drive(&config, request))
}

fn drive(config: &BuildConfig, request: BuildRequest) -> i32 {
    let outcome = Orchestrator::new(config, ProcessRunner::new(), request).run();
    output::outcome(&outcome);
    outcome.exit_code()
}

fn check(wasm_path: &Path, policy: Option<&Path>, format: OutputFormat) -> Result<i32> {
    let policy = match policy {
        Some(path) => ImportPolicy::from_file(path)?,
        None => ImportPolicy::default(),
    };
    let tool = ToolInfo {
        name: TOOL_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let report = inspect(wasm_path, &policy, tool)?;

    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)? + "\n",
        OutputFormat::Text => render::render_text(&report),
    };
    print!("{rendered}");

    Ok(report.exit_code)
}
