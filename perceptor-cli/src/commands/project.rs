//! `perceptor project` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use perceptor_core::types::ScanCounts;
use perceptor_scanner::{ScanBackend, is_project_done};

use crate::cli::{ProjectAction, ProjectArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `project` command against any scan backend.
pub async fn execute<S: ScanBackend>(
    args: ProjectArgs,
    backend: &S,
    writer: &OutputWriter,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match args.action {
        ProjectAction::Fetch { name } => {
            let report = fetch(backend, &name).await?;
            writer.render_to(&report, out)
        }
    }
}

/// Look up a project and summarize its scan state.
///
/// A project that exists but cannot be aggregated is still reported;
/// the aggregation failure is carried in `error`.
pub async fn fetch<S: ScanBackend>(backend: &S, name: &str) -> Result<ProjectReport, CliError> {
    info!(project = name, "fetching project");
    let Some(project) = backend.fetch_project(name).await? else {
        return Ok(ProjectReport {
            name: name.to_owned(),
            found: false,
            done: false,
            counts: None,
            vulnerabilities: Vec::new(),
            error: None,
        });
    };

    let done = is_project_done(&project);
    let (counts, vulnerabilities, error) = match project.scan_results() {
        Ok(results) => (
            Some(results.counts),
            results
                .vulnerabilities
                .iter()
                .map(ToString::to_string)
                .collect(),
            None,
        ),
        Err(e) => (None, Vec::new(), Some(e.to_string())),
    };

    Ok(ProjectReport {
        name: name.to_owned(),
        found: true,
        done,
        counts,
        vulnerabilities,
        error,
    })
}

/// Project lookup report.
#[derive(Debug, Serialize)]
pub struct ProjectReport {
    pub name: String,
    pub found: bool,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<ScanCounts>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Render for ProjectReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Project: {}", self.name.bold())?;
        if !self.found {
            return writeln!(w, "  Status: {}", "NOT FOUND".yellow());
        }
        if self.done {
            writeln!(w, "  Status: {}", "COMPLETE".green().bold())?;
        } else {
            writeln!(w, "  Status: {}", "IN PROGRESS".yellow())?;
        }
        if let Some(counts) = &self.counts {
            writeln!(w, "  Policy violations: {}", counts.policy_violation_count)?;
            writeln!(w, "  Vulnerabilities:   {}", counts.vulnerability_count)?;
        }
        for vulnerability in &self.vulnerabilities {
            writeln!(w, "    - {vulnerability}")?;
        }
        if let Some(error) = &self.error {
            writeln!(w, "  Error: {}", error.red())?;
        }
        Ok(())
    }
}
