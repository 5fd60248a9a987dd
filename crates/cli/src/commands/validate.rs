//! Validate Command

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::{debug, info};

use formflow_engine::scenario::validate_suite;
use formflow_engine::{RunnerConfig, Scenario};

use crate::output::{print_error, print_list, print_success, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// Directory of scenario YAML files
    #[arg(short, long, default_value = "scenarios")]
    pub scenarios: PathBuf,

    /// Only validate scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Runner configuration (TOML) to check as well
    #[arg(short, long, env = "FORMFLOW_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Load and check scenarios; returns the process exit code.
pub fn execute(args: ValidateArgs, format: OutputFormat) -> Result<i32> {
    if let Some(path) = &args.config {
        match RunnerConfig::from_file(path) {
            Ok(config) => debug!("Config {} ok: {:?}", path.display(), config),
            Err(e) => {
                print_error(&format!("{}: {}", path.display(), e));
                return Ok(1);
            }
        }
    }

    let scenarios = match load(&args) {
        Ok(scenarios) => scenarios,
        Err(e) => {
            print_error(&e.to_string());
            return Ok(1);
        }
    };
    info!("Loaded {} scenario(s) from {}", scenarios.len(), args.scenarios.display());

    if let Err(e) = validate_suite(&scenarios) {
        print_error(&e.to_string());
        return Ok(1);
    }

    print_list(&scenarios, format)?;
    if format == OutputFormat::Table {
        print_success(&format!("{} scenario(s) valid", scenarios.len()));
    }
    Ok(0)
}

fn load(args: &ValidateArgs) -> formflow_engine::EngineResult<Vec<Scenario>> {
    let scenarios = Scenario::load_all(&args.scenarios)?;
    Ok(match &args.tag {
        Some(tag) => Scenario::filter_by_tag(&scenarios, tag)
            .into_iter()
            .cloned()
            .collect(),
        None => scenarios,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(dir: &std::path::Path) -> ValidateArgs {
        ValidateArgs {
            scenarios: dir.to_path_buf(),
            tag: None,
            config: None,
        }
    }

    #[test]
    fn test_valid_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("smoke.yaml"),
            r#"
name: open-register-page
steps:
  - action: navigate
    url: /register
"#,
        )
        .unwrap();

        assert_eq!(execute(args(dir.path()), OutputFormat::Json).unwrap(), 0);
    }

    #[test]
    fn test_undeclared_binding_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("broken.yaml"),
            r#"
name: broken
steps:
  - action: fill
    target: { role: textbox, name: "Email:" }
    value: "${email}"
"#,
        )
        .unwrap();

        assert_eq!(execute(args(dir.path()), OutputFormat::Json).unwrap(), 1);
    }

    #[test]
    fn test_bad_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("formflow.toml");
        std::fs::write(&config, "concurrency = 0\n").unwrap();

        let mut args = args(dir.path());
        args.config = Some(config);
        assert_eq!(execute(args, OutputFormat::Json).unwrap(), 1);
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            execute(args(&dir.path().join("no-such-dir")), OutputFormat::Json).unwrap(),
            1
        );
    }
}
