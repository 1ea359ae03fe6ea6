//! Single external-tool invocations.
//!
//! A stage is one process launch treated as all-or-nothing. Each stage
//! describes its command, including its environment, in a [`CommandSpec`]
//! built from scratch; nothing is written to this process's own environment.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::INTERNAL_EXIT_CODE;

const CARGO_TERM_COLOR: &str = "CARGO_TERM_COLOR";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compile,
    Validate,
    Optimize,
    GenerateAbi,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compile => "compile",
            Self::Validate => "validate",
            Self::Optimize => "optimize",
            Self::GenerateAbi => "generate-abi",
        })
    }
}

/// A fully described process launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Variables set for this launch only.
    pub env: BTreeMap<String, String>,
    /// Inherited variables hidden from this launch.
    pub env_remove: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    /// Shell-like rendering, e.g. `RUSTC_BOOTSTRAP=1 cargo build`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}=\"{value}\" ")?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a launched process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Last lines the process wrote to stderr.
    pub stderr_tail: String,
}

impl ProcessExit {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            stderr_tail: String::new(),
        }
    }

    pub fn failed(code: i32, stderr_tail: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stderr_tail: stderr_tail.into(),
        }
    }
}

/// Launches processes on behalf of pipeline stages.
pub trait StageRunner {
    fn run(&mut self, command: &CommandSpec) -> io::Result<ProcessExit>;
}

impl<R: StageRunner + ?Sized> StageRunner for &mut R {
    fn run(&mut self, command: &CommandSpec) -> io::Result<ProcessExit> {
        (**self).run(command)
    }
}

/// Runs commands as real child processes.
///
/// stdout is inherited so tool output appears live. stderr is forwarded
/// line by line as it arrives while the last lines are retained for the
/// failure excerpt. Because the child's stderr is a pipe, cargo is told to
/// keep its colors whenever our own stderr is a terminal.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    tail_lines: usize,
}

impl ProcessRunner {
    pub const DEFAULT_TAIL_LINES: usize = 20;

    pub fn new() -> Self {
        Self {
            tail_lines: Self::DEFAULT_TAIL_LINES,
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRunner for ProcessRunner {
    fn run(&mut self, spec: &CommandSpec) -> io::Result<ProcessExit> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());
        for key in &spec.env_remove {
            command.env_remove(key);
        }
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        let inherited_color = std::env::var_os(CARGO_TERM_COLOR).is_some();
        let stderr_is_terminal = io::stderr().is_terminal();
        if let Some((key, value)) = color_override(spec, stderr_is_terminal, inherited_color) {
            command.env(key, value);
        }

        debug!(command = %spec, "spawning");
        let mut child = command.spawn()?;

        let mut tail = VecDeque::with_capacity(self.tail_lines);
        let forwarded = match child.stderr.take() {
            Some(stderr) => forward_stderr(stderr, &mut tail, self.tail_lines),
            None => Ok(()),
        };

        // Always reap the child, even if forwarding broke off.
        let status = child.wait()?;
        forwarded?;

        Ok(ProcessExit {
            code: status.code(),
            stderr_tail: tail.into_iter().collect::<Vec<_>>().join("\n"),
        })
    }
}

/// Cargo's color choice for a child whose stderr we pipe.
///
/// An explicit setting on the command or one inherited from our own
/// environment is left alone.
fn color_override(
    spec: &CommandSpec,
    stderr_is_terminal: bool,
    inherited: bool,
) -> Option<(&'static str, &'static str)> {
    let explicit = inherited
        || spec.env.contains_key(CARGO_TERM_COLOR)
        || spec.env_remove.iter().any(|key| key == CARGO_TERM_COLOR);

    (stderr_is_terminal && !explicit).then_some((CARGO_TERM_COLOR, "always"))
}

fn forward_stderr(
    stderr: impl io::Read,
    tail: &mut VecDeque<String>,
    keep: usize,
) -> io::Result<()> {
    let mut reader = BufReader::new(stderr);
    let mut out = io::stderr().lock();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        out.write_all(&line)?;
        out.flush()?;

        if keep > 0 {
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(String::from_utf8_lossy(&line).trim_end().to_string());
        }
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    Success { output_path: PathBuf },
    Failure {
        exit_code: i32,
        stderr_excerpt: String,
    },
}

impl StageResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Run `command` as one stage whose product is `output_path`.
///
/// A launch error or a signal death is reported as a failure with the
/// internal exit code; the tool's own reasons for failing are not parsed.
pub fn run_stage(
    runner: &mut dyn StageRunner,
    command: &CommandSpec,
    output_path: &Path,
) -> StageResult {
    info!(command = %command, "running stage command");

    match runner.run(command) {
        Ok(ProcessExit { code: Some(0), .. }) => StageResult::Success {
            output_path: output_path.to_path_buf(),
        },
        Ok(ProcessExit { code, stderr_tail }) => {
            let exit_code = code.unwrap_or(INTERNAL_EXIT_CODE);
            info!(program = %command.program, exit_code, "stage command failed");
            StageResult::Failure {
                exit_code,
                stderr_excerpt: stderr_tail,
            }
        }
        Err(err) => {
            info!(program = %command.program, error = %err, "failed to launch stage command");
            StageResult::Failure {
                exit_code: INTERNAL_EXIT_CODE,
                stderr_excerpt: format!("failed to launch {}: {err}", command.program),
            }
        }
    }
}
