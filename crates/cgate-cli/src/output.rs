//! Operator-facing status lines.
//!
//! Progress goes to stderr so stdout stays clean for `check --format json`.

use std::path::Path;

use anstyle::{AnsiColor, Color, Style};

use cgate_core::error::BuildError;
use cgate_core::pipeline::optimize::INSTALL_HINT;
use cgate_core::pipeline::orchestrator::{Advisory, PipelineOutcome};
use cgate_core::report::render::render_violations;

const OK: Style = Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Green)));
const WARN: Style = Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
const ERR: Style = Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red)));
const PATH: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

pub fn success(message: &str) {
    eprintln!("{OK}✓{OK:#} {message}");
}

pub fn warning(message: &str) {
    eprintln!("{WARN}warning:{WARN:#} {message}");
}

pub fn error(message: &str) {
    eprintln!("{ERR}error:{ERR:#} {message}");
}

pub fn path(label: &str, path: &Path) {
    eprintln!("  {label}: {PATH}{}{PATH:#}", path.display());
}

/// Summarize a finished pipeline run.
pub fn outcome(outcome: &PipelineOutcome) {
    for advisory in &outcome.advisories {
        warning(&advisory.to_string());
        match advisory {
            Advisory::OptimizerUnavailable { .. } => eprintln!("  {INSTALL_HINT}"),
        }
    }

    match outcome.failure() {
        None => {
            success("build finished");
            if let Some(artifact) = &outcome.artifact {
                path("contract", artifact);
            }
            if let Some(abi) = &outcome.abi {
                path("abi", abi);
            }
        }
        Some((stage, reason)) => {
            error(&format!("{stage} stage failed: {reason}"));
            failure_detail(reason);
        }
    }
}

fn failure_detail(reason: &BuildError) {
    match reason {
        BuildError::PolicyViolation { violations } => {
            eprint!("{}", render_violations(violations));
        }
        BuildError::StageProcess { stderr_excerpt, .. } if !stderr_excerpt.is_empty() => {
            eprintln!("last lines of tool output:");
            for line in stderr_excerpt.lines() {
                eprintln!("  {line}");
            }
        }
        _ => {}
    }
}
