//! Runner configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::scenario::{Scenario, Step};
use crate::wait::WaitPolicy;

/// Selector matching rendered validation errors.
pub const DEFAULT_ERROR_SELECTOR: &str = r#"[class*="error"], [role="alert"]"#;

/// Configuration for a scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Prefix for relative navigation URLs
    pub base_url: Option<String>,

    /// Maximum number of scenarios in flight
    pub concurrency: usize,

    /// Extra attempts for scenarios that end `Errored`
    pub max_retries: u32,

    /// Ceiling for resolving a step's element
    pub element_timeout_ms: u64,

    /// Ceiling for each expectation to hold
    pub expectation_timeout_ms: u64,

    /// Ceiling for a navigation to complete
    pub navigation_timeout_ms: u64,

    /// Polling interval for bounded waits
    pub poll_interval_ms: u64,

    /// Fixed per-scenario timeout (None = derived from the scenario)
    pub scenario_timeout_ms: Option<u64>,

    /// Added on top of a derived per-scenario timeout
    pub timeout_margin_ms: u64,

    /// Cancel the whole run after this long
    pub run_deadline_ms: Option<u64>,

    /// Selector used by catalog scenarios to find validation errors
    pub error_selector: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            concurrency: 4,
            max_retries: 0,
            element_timeout_ms: 5_000,
            expectation_timeout_ms: 5_000,
            navigation_timeout_ms: 10_000,
            poll_interval_ms: 100,
            scenario_timeout_ms: None,
            timeout_margin_ms: 5_000,
            run_deadline_ms: None,
            error_selector: DEFAULT_ERROR_SELECTOR.to_string(),
        }
    }
}

impl RunnerConfig {
    /// Parse a config from TOML. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.concurrency == 0 {
            return Err(EngineError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "poll_interval_ms must be positive".into(),
            ));
        }
        if self.poll_interval_ms > self.element_timeout_ms {
            return Err(EngineError::InvalidConfig(format!(
                "poll_interval_ms ({}) exceeds element_timeout_ms ({})",
                self.poll_interval_ms, self.element_timeout_ms
            )));
        }
        if self.scenario_timeout_ms == Some(0) {
            return Err(EngineError::InvalidConfig(
                "scenario_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn element_wait(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.element_timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    pub fn expectation_wait(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.expectation_timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_ms.map(Duration::from_millis)
    }

    /// Timeout for one attempt of `scenario`.
    ///
    /// Precedence: the scenario's own `timeout_ms`, then
    /// `scenario_timeout_ms`, then the sum of every step and expectation
    /// ceiling plus the margin.
    pub fn scenario_timeout(&self, scenario: &Scenario) -> Duration {
        if let Some(ms) = scenario.timeout_ms.or(self.scenario_timeout_ms) {
            return Duration::from_millis(ms);
        }

        let steps: u64 = scenario
            .steps
            .iter()
            .map(|step| match step {
                Step::Navigate { .. } => self.navigation_timeout_ms,
                _ => self.element_timeout_ms,
            })
            .sum();
        let expectations = self.expectation_timeout_ms * scenario.expectations.len() as u64;

        Duration::from_millis(steps + expectations + self.timeout_margin_ms)
    }
}
