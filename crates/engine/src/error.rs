//! Error types for the scenario engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading scenarios, configuration or reports.
///
/// These never describe the outcome of a scenario. Once a run has started,
/// every scenario ends in a [`crate::report::Verdict`] instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Invalid scenario '{name}': {reason}")]
    InvalidScenario { name: String, reason: String },

    #[error("Duplicate scenario name: {0}")]
    DuplicateScenario(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read scenario directory: {0}")]
    ScenarioDir(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure reported by a page driver for a single call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The element is not (or no longer) present on the page.
    #[error("element not found: {0}")]
    NotFound(String),

    #[error("driver timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("browsing context closed")]
    Closed,
}

/// Infrastructure-class failure: a step could not be executed at all.
///
/// Every variant except [`ExecutionError::Cancelled`] is eligible for retry.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("element not found within {timeout_ms} ms: {element}")]
    ElementNotFound { element: String, timeout_ms: u64 },

    #[error("driver fault: {0}")]
    DriverFault(String),

    #[error("timed out after {after_ms} ms: {what}")]
    Timeout { what: String, after_ms: u64 },

    #[error("cancelled")]
    Cancelled,
}

impl ExecutionError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExecutionError::Cancelled)
    }
}

impl From<DriverError> for ExecutionError {
    fn from(e: DriverError) -> Self {
        match e {
            // A handle that vanished between resolution and use is still a
            // missing element, just one we cannot put a wait figure on.
            DriverError::NotFound(element) => ExecutionError::ElementNotFound {
                element,
                timeout_ms: 0,
            },
            other => ExecutionError::DriverFault(other.to_string()),
        }
    }
}
