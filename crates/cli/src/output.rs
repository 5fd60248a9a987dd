//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use formflow_engine::{RunReport, Scenario, ScenarioRecord, Verdict};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for Scenario {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Steps", "Expectations", "Bindings", "Tags"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.steps.len().to_string(),
            self.expectations.len().to_string(),
            self.bindings.keys().cloned().collect::<Vec<_>>().join(", "),
            self.tags.join(", "),
        ]
    }
}

impl TableDisplay for ScenarioRecord {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Verdict", "Attempts", "Duration", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name().to_string(),
            verdict_label(&self.verdict),
            self.attempts.to_string(),
            format!("{} ms", self.duration_ms),
            self.verdict.detail(),
        ]
    }
}

fn verdict_label(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Passed => "✓ passed".green().to_string(),
        Verdict::Failed { .. } => "✗ failed".red().to_string(),
        Verdict::Errored { .. } => "! errored".yellow().to_string(),
    }
}

/// Render a list of items as a string
pub fn render_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            table.to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(items)?,
        OutputFormat::Yaml => serde_yaml::to_string(items)?,
    })
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> anyhow::Result<()> {
    if items.is_empty() && format == OutputFormat::Table {
        println!("No items found.");
        return Ok(());
    }
    println!("{}", render_list(items, format)?);
    Ok(())
}

/// Print a run report
pub fn print_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            print_list(report.records(), format)?;

            let summary = report.summary();
            let line = format!(
                "{} passed, {} failed, {} errored ({:.1}% pass rate)",
                summary.passed,
                summary.failed,
                summary.errored,
                summary.pass_rate
            );
            if report.is_success() {
                print_success(&line);
            } else {
                print_error(&line);
                println!();
                print!("{}", report.render_text());
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(report)?),
    }
    Ok(())
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}
