//! Catalog Command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use formflow_engine::catalog::registration_suite_with;
use formflow_engine::{RunnerConfig, Scenario};

use crate::output::{print_list, OutputFormat};

const DEFAULT_BASE_URL: &str = "https://demowebshop.tricentis.com";

#[derive(Args)]
pub struct CatalogArgs {
    /// Site under test (overrides the config file)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Selector matching rendered validation errors (overrides the config file)
    #[arg(long)]
    pub error_selector: Option<String>,

    /// Runner configuration (TOML) providing `base_url` and `error_selector`
    #[arg(short, long, env = "FORMFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only print scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

pub fn execute(args: CatalogArgs, format: OutputFormat) -> Result<i32> {
    let config = match &args.config {
        Some(path) => RunnerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunnerConfig::default(),
    };

    let base_url = args
        .base_url
        .or(config.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let error_selector = args.error_selector.unwrap_or(config.error_selector);

    let suite = registration_suite_with(&base_url, &error_selector);
    let suite: Vec<Scenario> = match &args.tag {
        Some(tag) => Scenario::filter_by_tag(&suite, tag)
            .into_iter()
            .cloned()
            .collect(),
        None => suite,
    };

    print_list(&suite, format)?;
    Ok(0)
}
