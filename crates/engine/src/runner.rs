//! Scenario runner

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assertions::AssertionEvaluator;
use crate::config::RunnerConfig;
use crate::driver::{DriverFactory, PageDriver};
use crate::error::{EngineResult, ExecutionError};
use crate::executor::StepExecutor;
use crate::report::{ReportWriter, RunReport, ScenarioRecord, StepOutcome, StepRecord, Verdict};
use crate::scenario::{validate_suite, Bindings, Expectation, Scenario};
use crate::unique::UniqueValueGenerator;

/// Ceiling for releasing a driver once its scenario has finished or been cut short.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs scenarios concurrently, each against its own driver instance.
///
/// Cloning is cheap; clones share configuration and the cancellation token.
/// Each run derives its own child token, so a run deadline only ends that run.
#[derive(Clone)]
pub struct ScenarioRunner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    factory: Arc<dyn DriverFactory>,
    config: RunnerConfig,
    executor: StepExecutor,
    evaluator: AssertionEvaluator,
    generator: Arc<UniqueValueGenerator>,
    cancel: CancellationToken,
}

/// Result of one attempt at a scenario.
struct Attempt {
    verdict: Verdict,
    bindings: Bindings,
    steps: Vec<StepRecord>,
}

impl ScenarioRunner {
    /// Create a runner. Fails if the configuration is invalid.
    pub fn new(factory: Arc<dyn DriverFactory>, config: RunnerConfig) -> EngineResult<Self> {
        Self::with_generator(factory, config, Arc::new(UniqueValueGenerator::new()))
    }

    /// Create a runner drawing unique values from a shared generator.
    pub fn with_generator(
        factory: Arc<dyn DriverFactory>,
        config: RunnerConfig,
        generator: Arc<UniqueValueGenerator>,
    ) -> EngineResult<Self> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(RunnerInner {
                executor: StepExecutor::from_config(&config),
                evaluator: AssertionEvaluator::from_config(&config),
                factory,
                config,
                generator,
                cancel: CancellationToken::new(),
            }),
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.inner.config
    }

    /// Token that cancels the current (and any later) run of this runner.
    ///
    /// A run that hits its own deadline cancels only a child of this token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Run every scenario found under `dir`, optionally only those tagged `tag`.
    pub async fn run_dir(&self, dir: &Path, tag: Option<&str>) -> EngineResult<RunReport> {
        let scenarios = Scenario::load_all(dir)?;
        let scenarios: Vec<Scenario> = match tag {
            Some(tag) => Scenario::filter_by_tag(&scenarios, tag)
                .into_iter()
                .cloned()
                .collect(),
            None => scenarios,
        };
        self.run(&scenarios).await
    }

    /// Run `scenarios` and return the finalized report.
    ///
    /// The suite is validated up front (non-empty steps, unique names, known
    /// bindings). Once execution starts every scenario produces exactly one
    /// record, whatever happens to it.
    pub async fn run(&self, scenarios: &[Scenario]) -> EngineResult<RunReport> {
        validate_suite(scenarios)?;

        let config = &self.inner.config;
        let writer = ReportWriter::new();
        let start = Instant::now();

        info!(
            "Running {} scenario(s) with concurrency {} (run {})...",
            scenarios.len(),
            config.concurrency,
            writer.run_id()
        );

        let cancel = self.inner.cancel.child_token();
        let deadline = config.run_deadline().map(|after| {
            let token = cancel.clone();
            tokio::spawn(async move {
                sleep(after).await;
                warn!("Run deadline of {} ms reached, cancelling", after.as_millis());
                token.cancel();
            })
        });

        let permits = Arc::new(Semaphore::new(config.concurrency));
        let mut tasks = JoinSet::new();

        for scenario in scenarios.iter().cloned() {
            let inner = self.inner.clone();
            let writer = writer.clone();
            let permits = permits.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let record = inner.run_isolated(scenario, &cancel).await;
                writer.append(record);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Scenario task failed to complete: {}", e);
            }
        }

        if let Some(handle) = deadline {
            handle.abort();
        }

        let report = writer.finalize();
        let summary = report.summary();

        info!("");
        info!(
            "Run Results: {} passed, {} failed, {} errored ({} ms)",
            summary.passed,
            summary.failed,
            summary.errored,
            start.elapsed().as_millis()
        );

        Ok(report)
    }
}

impl RunnerInner {
    /// Run one scenario, turning a panic into an `Errored` record.
    async fn run_isolated(&self, scenario: Scenario, cancel: &CancellationToken) -> ScenarioRecord {
        let started_at = Utc::now();
        let start = Instant::now();

        let outcome = AssertUnwindSafe(self.run_scenario(&scenario, cancel))
            .catch_unwind()
            .await;

        let (verdict, attempts, bindings, steps) = match outcome {
            Ok(result) => result,
            Err(_) => {
                error!("Scenario '{}' panicked", scenario.name);
                let cause = ExecutionError::DriverFault("scenario execution panicked".into());
                (Verdict::Errored { cause }, 1, Bindings::default(), Vec::new())
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &verdict {
            Verdict::Passed => info!("✓ {} ({} ms)", scenario.name, duration_ms),
            other => error!(
                "✗ {} [{}] - {}",
                scenario.name,
                other.label(),
                other.detail()
            ),
        }

        ScenarioRecord {
            scenario,
            verdict,
            duration_ms,
            started_at,
            attempts,
            bindings,
            steps,
        }
    }

    /// Attempt a scenario, retrying infrastructure failures only.
    async fn run_scenario(
        &self,
        scenario: &Scenario,
        cancel: &CancellationToken,
    ) -> (Verdict, u32, Bindings, Vec<StepRecord>) {
        let max_attempts = self.config.max_retries + 1;
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!("Running scenario: {} (attempt {})", scenario.name, attempts);

            let attempt = self.attempt(scenario, cancel).await;

            if let Verdict::Errored { cause } = &attempt.verdict {
                if cause.is_retryable() && attempts < max_attempts && !cancel.is_cancelled() {
                    warn!(
                        "Scenario '{}' errored on attempt {}/{}: {} - retrying with a fresh driver",
                        scenario.name, attempts, max_attempts, cause
                    );
                    continue;
                }
            }

            return (attempt.verdict, attempts, attempt.bindings, attempt.steps);
        }
    }

    async fn attempt(&self, scenario: &Scenario, cancel: &CancellationToken) -> Attempt {
        let bindings = Bindings::resolve(&scenario.bindings, &self.generator);
        let mut steps = Vec::with_capacity(scenario.steps.len());

        let verdict = if cancel.is_cancelled() {
            Verdict::Errored {
                cause: ExecutionError::Cancelled,
            }
        } else {
            self.drive(scenario, &bindings, &mut steps, cancel).await
        };

        for (index, step) in scenario.steps.iter().enumerate().skip(steps.len()) {
            steps.push(StepRecord {
                index,
                step: step.bind(&bindings).to_string(),
                outcome: StepOutcome::Skipped,
                duration_ms: 0,
            });
        }

        Attempt {
            verdict,
            bindings,
            steps,
        }
    }

    /// Open a fresh driver, run the steps and evaluate under the scenario's
    /// ceiling, then close the driver however the attempt ended.
    async fn drive(
        &self,
        scenario: &Scenario,
        bindings: &Bindings,
        steps: &mut Vec<StepRecord>,
        cancel: &CancellationToken,
    ) -> Verdict {
        let ceiling = self.config.scenario_timeout(scenario);
        let deadline = Instant::now() + ceiling;
        let timed_out = || ExecutionError::Timeout {
            what: format!("scenario '{}'", scenario.name),
            after_ms: ceiling.as_millis() as u64,
        };

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
            opened = timeout_at(deadline, self.factory.open()) => opened.map_err(|_| timed_out()),
        };
        let driver = match opened {
            Ok(Ok(driver)) => driver,
            Ok(Err(e)) => {
                warn!("Could not open driver for '{}': {}", scenario.name, e);
                return Verdict::Errored {
                    cause: ExecutionError::DriverFault(format!("could not open driver: {}", e)),
                };
            }
            Err(cause) => return interrupted(scenario, bindings, steps, cause),
        };

        let run = AssertUnwindSafe(self.drive_with(driver.as_ref(), scenario, bindings, steps));
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
            run = timeout_at(deadline, run.catch_unwind()) => run.map_err(|_| timed_out()),
        };

        match timeout(CLOSE_TIMEOUT, driver.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to close driver for '{}': {}", scenario.name, e),
            Err(_) => warn!(
                "Driver for '{}' did not close within {} ms",
                scenario.name,
                CLOSE_TIMEOUT.as_millis()
            ),
        }

        match outcome {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(_)) => {
                error!("Scenario '{}' panicked", scenario.name);
                let cause = ExecutionError::DriverFault("scenario execution panicked".into());
                interrupted(scenario, bindings, steps, cause)
            }
            Err(cause) => interrupted(scenario, bindings, steps, cause),
        }
    }

    async fn drive_with(
        &self,
        driver: &dyn PageDriver,
        scenario: &Scenario,
        bindings: &Bindings,
        steps: &mut Vec<StepRecord>,
    ) -> Verdict {
        for (index, step) in scenario.steps.iter().enumerate() {
            let step = step.bind(bindings);
            let started = Instant::now();
            let result = self.executor.execute(&step, driver).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(()) => steps.push(StepRecord {
                    index,
                    step: step.to_string(),
                    outcome: StepOutcome::Ok,
                    duration_ms,
                }),
                Err(cause) => {
                    warn!(
                        "Scenario '{}' step {} ({}) errored: {}",
                        scenario.name,
                        index + 1,
                        step,
                        cause
                    );
                    steps.push(StepRecord {
                        index,
                        step: step.to_string(),
                        outcome: StepOutcome::Errored {
                            cause: cause.clone(),
                        },
                        duration_ms,
                    });
                    return Verdict::Errored { cause };
                }
            }
        }

        let expectations: Vec<Expectation> = scenario
            .expectations
            .iter()
            .map(|e| e.bind(bindings))
            .collect();
        self.evaluator.evaluate(&expectations, driver).await
    }
}

/// Record the step that was in flight when the attempt was cut short.
fn interrupted(
    scenario: &Scenario,
    bindings: &Bindings,
    steps: &mut Vec<StepRecord>,
    cause: ExecutionError,
) -> Verdict {
    if let Some(step) = scenario.steps.get(steps.len()) {
        steps.push(StepRecord {
            index: steps.len(),
            step: step.bind(bindings).to_string(),
            outcome: StepOutcome::Errored {
                cause: cause.clone(),
            },
            duration_ms: 0,
        });
    }
    Verdict::Errored { cause }
}
