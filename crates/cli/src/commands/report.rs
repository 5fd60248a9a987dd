//! Report Command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use formflow_engine::RunReport;

use crate::output::{print_report, OutputFormat};

#[derive(Args)]
pub struct ReportArgs {
    /// Path to a saved run-report.json
    pub file: PathBuf,
}

/// Render the report; the exit code is the report's own.
pub fn execute(args: ReportArgs, format: OutputFormat) -> Result<i32> {
    let report = RunReport::read_json(&args.file)
        .with_context(|| format!("reading report {}", args.file.display()))?;

    print_report(&report, format)?;
    Ok(report.exit_code())
}
