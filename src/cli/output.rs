//! Output formatting for the `workspaces` report

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use super::commands::ReportFormat;

/// Workspace manifests found in a build context
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkspaceReport {
    pub context: PathBuf,
    pub patterns: Vec<String>,
}

pub struct OutputFormatter {
    format: ReportFormat,
}

impl OutputFormatter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn format(&self, report: &WorkspaceReport) -> Result<String> {
        match self.format {
            ReportFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize workspace report to JSON"),
            ReportFormat::Human => Ok(self.format_human(report)),
        }
    }

    fn format_human(&self, report: &WorkspaceReport) -> String {
        let mut output = format!("Context: {}\n", report.context.display());

        if report.patterns.is_empty() {
            output.push_str("No workspaces declared\n");
            return output;
        }

        output.push_str(&format!("Workspaces ({}):\n", report.patterns.len()));
        for pattern in &report.patterns {
            output.push_str(&format!("  {}\n", pattern));
        }
        output
    }
}
