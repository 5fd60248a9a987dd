//! Run report: per-scenario verdicts, timing and failure detail
//!
//! A [`ReportWriter`] is created empty when a run starts and shared by every
//! concurrently running scenario; each one appends exactly one record. When
//! the run ends the writer is finalized into an immutable [`RunReport`].

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineResult, ExecutionError};
use crate::scenario::{Bindings, Expectation, Scenario};

/// Terminal classification of one scenario execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    /// Steps ran and every expectation held.
    Passed,
    /// Steps ran but an expectation did not hold (business-logic signal).
    Failed {
        reason: String,
        expectation: Expectation,
    },
    /// A step could not be executed (infrastructure signal).
    Errored { cause: ExecutionError },
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Verdict::Failed { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, Verdict::Errored { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Passed => "passed",
            Verdict::Failed { .. } => "failed",
            Verdict::Errored { .. } => "errored",
        }
    }

    /// One-line diagnosis, empty for `Passed`.
    pub fn detail(&self) -> String {
        match self {
            Verdict::Passed => String::new(),
            Verdict::Failed { reason, .. } => reason.clone(),
            Verdict::Errored { cause } => cause.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    Errored { cause: ExecutionError },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub step: String,
    pub outcome: StepOutcome,
    pub duration_ms: u64,
}

/// Outcome of one scenario, after retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub scenario: Scenario,
    pub verdict: Verdict,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Binding values used by the final attempt
    #[serde(default)]
    pub bindings: Bindings,
    /// Step outcomes of the final attempt
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

impl ScenarioRecord {
    pub fn name(&self) -> &str {
        &self.scenario.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub duration_ms: u64,
    pub pass_rate: f64,
}

/// Immutable record of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    records: Vec<ScenarioRecord>,
}

impl RunReport {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Records in completion order.
    pub fn records(&self) -> &[ScenarioRecord] {
        &self.records
    }

    pub fn record(&self, scenario: &str) -> Option<&ScenarioRecord> {
        self.records.iter().find(|r| r.scenario.name == scenario)
    }

    pub fn summary(&self) -> RunSummary {
        let total = self.records.len();
        let passed = self.records.iter().filter(|r| r.verdict.is_passed()).count();
        let failed = self.records.iter().filter(|r| r.verdict.is_failed()).count();
        let errored = self.records.iter().filter(|r| r.verdict.is_errored()).count();

        let pass_rate = if total == 0 {
            100.0
        } else {
            passed as f64 / total as f64 * 100.0
        };

        RunSummary {
            total,
            passed,
            failed,
            errored,
            duration_ms: (self.finished_at - self.started_at).num_milliseconds().max(0) as u64,
            pass_rate,
        }
    }

    /// True iff every scenario passed.
    pub fn is_success(&self) -> bool {
        self.records.iter().all(|r| r.verdict.is_passed())
    }

    /// Process exit status for this run: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Render the report as a plain-text table with failure details.
    pub fn render_text(&self) -> String {
        let summary = self.summary();
        let mut out = String::new();

        let _ = writeln!(out, "=== Run {} ===", self.run_id);
        let _ = writeln!(
            out,
            "Started: {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(
            out,
            "Total: {} | Passed: {} | Failed: {} | Errored: {} | Pass Rate: {:.1}%",
            summary.total, summary.passed, summary.failed, summary.errored, summary.pass_rate
        );
        let _ = writeln!(out, "Duration: {}ms", summary.duration_ms);
        let _ = writeln!(out);

        let _ = writeln!(
            out,
            "  {:<40} {:<8} {:<8} {:<10}",
            "Scenario", "Verdict", "Attempts", "Duration"
        );
        let _ = writeln!(out, "  {}", "-".repeat(70));
        for record in &self.records {
            let _ = writeln!(
                out,
                "  {:<40} {:<8} {:<8} {:>8}ms",
                record.scenario.name,
                record.verdict.label().to_uppercase(),
                record.attempts,
                record.duration_ms
            );
        }

        let problems: Vec<&ScenarioRecord> = self
            .records
            .iter()
            .filter(|r| !r.verdict.is_passed())
            .collect();
        if !problems.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Failures:");
            for record in problems {
                let _ = writeln!(
                    out,
                    "  [{}] {}: {}",
                    record.verdict.label(),
                    record.scenario.name,
                    record.verdict.detail()
                );
                for (name, value) in record.bindings.iter() {
                    let _ = writeln!(out, "      {} = {}", name, value);
                }
                for step in &record.steps {
                    if let StepOutcome::Errored { cause } = &step.outcome {
                        let _ = writeln!(out, "      step {} {}: {}", step.index + 1, step.step, cause);
                    }
                }
            }
        }

        out
    }

    /// Write the report as `run-report.json` inside `output_dir`.
    pub fn write_json(&self, output_dir: &Path) -> EngineResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("run-report.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Report written to: {}", path.display());
        Ok(path)
    }

    pub fn read_json(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug)]
struct Pending {
    records: Vec<ScenarioRecord>,
    finalized: bool,
}

/// Append-only collector shared by concurrently running scenarios.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    inner: Arc<Mutex<Pending>>,
}

impl ReportWriter {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            inner: Arc::new(Mutex::new(Pending {
                records: Vec::new(),
                finalized: false,
            })),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Append one scenario's record. Returns false once the report has been
    /// finalized; the record is dropped in that case.
    pub fn append(&self, record: ScenarioRecord) -> bool {
        let mut pending = self.inner.lock();
        if pending.finalized {
            warn!(
                "Dropping record for '{}': report already finalized",
                record.scenario.name
            );
            return false;
        }
        pending.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze the collected records into a [`RunReport`].
    pub fn finalize(self) -> RunReport {
        let records = {
            let mut pending = self.inner.lock();
            pending.finalized = true;
            std::mem::take(&mut pending.records)
        };

        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            records,
        }
    }
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new()
    }
}
