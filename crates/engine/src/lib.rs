//! FormFlow scenario engine
//!
//! This crate runs declarative web-form scenarios (registration flows and
//! the like) against a browser automation driver and reports one verdict
//! per scenario:
//! - Scenarios are plain data, built in code or parsed from YAML
//! - Every scenario gets its own driver instance, so no session leaks
//! - Unique inputs are generated per attempt, fixed ones are reused on purpose
//! - Waits are bounded polls, never fixed sleeps
//! - A rejected submission is `Failed`, a broken browser is `Errored`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ScenarioRunner (tokio)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run(scenarios) -> RunReport                                │
//! │    ├── validate_suite()                                     │
//! │    ├── per scenario (bounded by `concurrency`):             │
//! │    │     ├── Bindings::resolve(UniqueValueGenerator)        │
//! │    │     ├── DriverFactory::open() -> PageDriver            │
//! │    │     ├── StepExecutor::execute(step)   ─┐ wait_until    │
//! │    │     ├── AssertionEvaluator::evaluate() ┘ (bounded)     │
//! │    │     └── retry Errored up to `max_retries`              │
//! │    └── ReportWriter::append -> finalize                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, description, tags                              │
//! │    ├── bindings: { name: unique | fixed }                   │
//! │    ├── steps: [Step]                                        │
//! │    │     ├── navigate { url }                               │
//! │    │     ├── fill { target, value }                         │
//! │    │     ├── click { target }                               │
//! │    │     └── select { target, option }                      │
//! │    └── expectations: [Expectation]                          │
//! │          ├── visible / not_visible { target }               │
//! │          ├── text_present / text_absent { text }            │
//! │          └── count_at_least { selector, min }               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assertions;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod unique;
pub mod wait;

pub use config::RunnerConfig;
pub use driver::{DriverFactory, ElementHandle, PageDriver, TextScope};
pub use error::{DriverError, EngineError, EngineResult, ExecutionError};
pub use report::{RunReport, RunSummary, ScenarioRecord, StepOutcome, StepRecord, Verdict};
pub use runner::ScenarioRunner;
pub use scenario::{Binding, Bindings, ElementRef, Expectation, NameMatch, Scenario, Step};
pub use unique::UniqueValueGenerator;
