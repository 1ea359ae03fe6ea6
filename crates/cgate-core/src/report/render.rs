use crate::policy::check::Verdict;
use crate::report::model::ValidationReport;
use crate::wasm::sections::ImportEntry;

pub fn render_text(report: &ValidationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", report.tool.name, report.tool.version));
    if let Some(path) = &report.artifact.path {
        out.push_str(&format!("Artifact: {path}\n"));
    }
    out.push_str(&format!(
        "Artifact size: {} bytes\n",
        report.artifact.size_bytes
    ));
    out.push_str(&format!(
        "{}: {}\n",
        report.artifact.hash.algorithm, report.artifact.hash.value
    ));
    out.push_str(&format!("Imports ({}):\n", report.imports.len()));
    for entry in &report.imports {
        out.push_str(&format!("  - {entry}\n"));
    }
    match &report.verdict {
        Verdict::Allowed => out.push_str("Verdict: ALLOWED\n"),
        Verdict::Rejected { violations } => {
            out.push_str("Verdict: REJECTED\n");
            out.push_str(&render_violations(violations));
        }
    }
    out
}

/// Operator-facing list of disallowed imports, one per line.
pub fn render_violations(violations: &[ImportEntry]) -> String {
    let mut out = String::from("Disallowed imports:\n");
    for entry in violations {
        out.push_str(&format!("  - {entry}\n"));
    }
    out
}
