//! FormFlow CLI - Main Entry Point
//!
//! Validates scenario files, exports the built-in registration suite and
//! turns saved run reports into a process exit status.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{catalog, report, validate};

/// FormFlow CLI - declarative web form scenarios
#[derive(Parser)]
#[command(name = "formflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate scenario files
    Validate(validate::ValidateArgs),

    /// Print the built-in registration suite
    Catalog(catalog::CatalogArgs),

    /// Render a saved run report and exit with its status
    Report(report::ReportArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match cli.command {
        Commands::Validate(args) => validate::execute(args, cli.format)?,
        Commands::Catalog(args) => catalog::execute(args, cli.format)?,
        Commands::Report(args) => report::execute(args, cli.format)?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
