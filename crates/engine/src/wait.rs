//! Bounded polling waits
//!
//! "Wait until a predicate holds or a ceiling elapses", shared by step
//! execution (element resolution) and expectation evaluation. The probe is
//! always run at least once, even with a zero ceiling.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::DriverError;

/// Ceiling and polling interval for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(100),
        }
    }
}

/// Answer of a single probe.
#[derive(Debug)]
pub enum Probe<T> {
    Ready(T),
    /// Not there yet; carries what was observed instead.
    Pending(String),
}

#[derive(Debug)]
pub enum WaitError {
    /// The ceiling elapsed without the predicate holding.
    Elapsed {
        waited: Duration,
        attempts: u32,
        last_observed: String,
    },
    /// The driver failed outright; waiting longer would not help.
    Fault(DriverError),
}

/// Poll `probe` until it is ready, faults, or the policy's ceiling elapses.
pub async fn wait_until<T, F, Fut>(policy: WaitPolicy, mut probe: F) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, DriverError>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match probe().await.map_err(WaitError::Fault)? {
            Probe::Ready(value) => return Ok(value),
            Probe::Pending(observed) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(WaitError::Elapsed {
                        waited: now - start,
                        attempts,
                        last_observed: observed,
                    });
                }
                sleep(policy.interval.min(deadline - now)).await;
            }
        }
    }
}
