//! Step execution against a page driver

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::RunnerConfig;
use crate::driver::{ElementHandle, PageDriver};
use crate::error::{DriverError, ExecutionError};
use crate::scenario::{ElementRef, Step};
use crate::wait::{wait_until, Probe, WaitError, WaitPolicy};

/// Runs one step at a time, translating driver failures into
/// [`ExecutionError`]s.
#[derive(Debug, Clone)]
pub struct StepExecutor {
    /// Ceiling for resolving the element a step acts on
    element_wait: WaitPolicy,

    /// Ceiling for a navigation to report load completion
    navigation_timeout: Duration,

    /// Prefix for relative navigation URLs
    base_url: Option<String>,
}

impl StepExecutor {
    pub fn new(element_wait: WaitPolicy, navigation_timeout: Duration) -> Self {
        Self {
            element_wait,
            navigation_timeout,
            base_url: None,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            element_wait: config.element_wait(),
            navigation_timeout: config.navigation_timeout(),
            base_url: config.base_url.clone(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Execute a single step. Bindings must already be substituted.
    pub async fn execute(&self, step: &Step, driver: &dyn PageDriver) -> Result<(), ExecutionError> {
        debug!("Executing step: {}", step);

        match step {
            Step::Navigate { url } => self.navigate(url, driver).await,
            Step::Fill { target, value } => {
                let element = self.resolve(target, driver).await?;
                driver
                    .fill(&element, value)
                    .await
                    .map_err(|e| self.action_error(target, e))
            }
            Step::Click { target } => {
                let element = self.resolve(target, driver).await?;
                driver
                    .click(&element)
                    .await
                    .map_err(|e| self.action_error(target, e))
            }
            Step::Select { target, option } => {
                let element = self.resolve(target, driver).await?;
                driver
                    .select_option(&element, option)
                    .await
                    .map_err(|e| self.action_error(target, e))
            }
        }
    }

    async fn navigate(&self, url: &str, driver: &dyn PageDriver) -> Result<(), ExecutionError> {
        let url = self.resolve_url(url);

        match timeout(self.navigation_timeout, driver.navigate(&url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("Navigation to {} failed: {}", url, e);
                Err(ExecutionError::DriverFault(e.to_string()))
            }
            Err(_) => Err(ExecutionError::Timeout {
                what: format!("navigate {}", url),
                after_ms: self.navigation_timeout.as_millis() as u64,
            }),
        }
    }

    /// Wait until `target` resolves to a visible element.
    pub async fn resolve(
        &self,
        target: &ElementRef,
        driver: &dyn PageDriver,
    ) -> Result<ElementHandle, ExecutionError> {
        let result = wait_until(self.element_wait, move || async move {
            let element = match driver.find_by_role(target).await {
                Ok(element) => element,
                Err(DriverError::NotFound(_)) => {
                    return Ok(Probe::Pending("no matching element".to_string()))
                }
                Err(e) => return Err(e),
            };
            match driver.is_visible(&element).await {
                Ok(true) => Ok(Probe::Ready(element)),
                Ok(false) => Ok(Probe::Pending("element present but hidden".to_string())),
                Err(DriverError::NotFound(_)) => Ok(Probe::Pending("element detached".to_string())),
                Err(e) => Err(e),
            }
        })
        .await;

        result.map_err(|e| match e {
            WaitError::Elapsed { last_observed, .. } => {
                debug!("Element {} not resolved: {}", target, last_observed);
                ExecutionError::ElementNotFound {
                    element: target.to_string(),
                    timeout_ms: self.element_wait.timeout_ms(),
                }
            }
            WaitError::Fault(e) => ExecutionError::DriverFault(e.to_string()),
        })
    }

    /// Join a relative URL onto the base URL. Absolute URLs pass through.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") {
            return url.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_string(),
        }
    }

    fn action_error(&self, target: &ElementRef, e: DriverError) -> ExecutionError {
        match e {
            DriverError::NotFound(_) => ExecutionError::ElementNotFound {
                element: target.to_string(),
                timeout_ms: self.element_wait.timeout_ms(),
            },
            other => ExecutionError::DriverFault(other.to_string()),
        }
    }
}
