//! Assertion evaluation against live page state
//!
//! Each expectation gets its own bounded polling wait, so asynchronous UI
//! updates (client-side validation, session propagation) have time to land.
//! A missing element is an unmet expectation, not an execution error: the
//! page answered, it just never reached the expected state.

use tracing::debug;

use crate::config::RunnerConfig;
use crate::driver::{PageDriver, TextScope};
use crate::error::{DriverError, ExecutionError};
use crate::report::Verdict;
use crate::scenario::Expectation;
use crate::wait::{wait_until, Probe, WaitError, WaitPolicy};

/// Evaluates expectations in order and produces a [`Verdict`].
#[derive(Debug, Clone)]
pub struct AssertionEvaluator {
    wait: WaitPolicy,
}

impl AssertionEvaluator {
    pub fn new(wait: WaitPolicy) -> Self {
        Self { wait }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.expectation_wait())
    }

    /// Evaluate `expectations` in listed order. The first one that does not
    /// hold within its ceiling decides the verdict.
    pub async fn evaluate(&self, expectations: &[Expectation], driver: &dyn PageDriver) -> Verdict {
        for expectation in expectations {
            debug!("Checking expectation: {}", expectation);

            match wait_until(self.wait, move || probe(expectation, driver)).await {
                Ok(()) => {}
                Err(WaitError::Elapsed {
                    waited,
                    last_observed,
                    ..
                }) => {
                    return Verdict::Failed {
                        reason: format!(
                            "{} did not hold within {} ms (last observed: {})",
                            expectation,
                            waited.as_millis(),
                            last_observed
                        ),
                        expectation: expectation.clone(),
                    };
                }
                Err(WaitError::Fault(e)) => {
                    return Verdict::Errored {
                        cause: ExecutionError::DriverFault(e.to_string()),
                    };
                }
            }
        }

        Verdict::Passed
    }
}

/// One non-waiting look at the page for `expectation`.
async fn probe(expectation: &Expectation, driver: &dyn PageDriver) -> Result<Probe<()>, DriverError> {
    match expectation {
        Expectation::Visible { target } => {
            let element = match driver.find_by_role(target).await {
                Ok(element) => element,
                Err(DriverError::NotFound(_)) => return Ok(Probe::Pending("element not found".into())),
                Err(e) => return Err(e),
            };
            match driver.is_visible(&element).await {
                Ok(true) => Ok(Probe::Ready(())),
                Ok(false) => Ok(Probe::Pending("element present but hidden".into())),
                Err(DriverError::NotFound(_)) => Ok(Probe::Pending("element detached".into())),
                Err(e) => Err(e),
            }
        }
        Expectation::NotVisible { target } => {
            let element = match driver.find_by_role(target).await {
                Ok(element) => element,
                Err(DriverError::NotFound(_)) => return Ok(Probe::Ready(())),
                Err(e) => return Err(e),
            };
            match driver.is_visible(&element).await {
                Ok(false) | Err(DriverError::NotFound(_)) => Ok(Probe::Ready(())),
                Ok(true) => Ok(Probe::Pending("element is visible".into())),
                Err(e) => Err(e),
            }
        }
        Expectation::TextPresent { text } => {
            let content = match driver.text_content(TextScope::Page).await {
                Ok(content) => content,
                Err(DriverError::NotFound(_)) => return Ok(Probe::Pending("page text unavailable".into())),
                Err(e) => return Err(e),
            };
            if content.contains(text.as_str()) {
                Ok(Probe::Ready(()))
            } else {
                Ok(Probe::Pending("text not on page".into()))
            }
        }
        Expectation::TextAbsent { text } => {
            let content = match driver.text_content(TextScope::Page).await {
                Ok(content) => content,
                Err(DriverError::NotFound(_)) => return Ok(Probe::Pending("page text unavailable".into())),
                Err(e) => return Err(e),
            };
            if content.contains(text.as_str()) {
                Ok(Probe::Pending("text is on page".into()))
            } else {
                Ok(Probe::Ready(()))
            }
        }
        Expectation::CountAtLeast { selector, min } => {
            if *min == 0 {
                return Ok(Probe::Ready(()));
            }
            let found = match driver.query_all(selector).await {
                Ok(found) => found.len(),
                Err(DriverError::NotFound(_)) => 0,
                Err(e) => return Err(e),
            };
            if found >= *min {
                Ok(Probe::Ready(()))
            } else {
                Ok(Probe::Pending(format!("{} matching element(s)", found)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use test_case::test_case;

    use crate::driver::ElementHandle;
    use crate::scenario::ElementRef;

    /// Static page: a set of visible/hidden elements, some text, and a number
    /// of error elements that only render after `errors_after` queries.
    struct StaticPage {
        elements: Vec<(ElementRef, bool)>,
        text: String,
        errors: usize,
        errors_after: u32,
        queries: AtomicU32,
        broken: bool,
        /// Text and query lookups answer `NotFound`, as after a detached frame
        detached: bool,
    }

    impl StaticPage {
        fn new() -> Self {
            Self {
                elements: vec![
                    (ElementRef::exact("heading", "Register"), true),
                    (ElementRef::exact("link", "Log in"), true),
                    (ElementRef::exact("textbox", "Honeypot"), false),
                ],
                text: "Register\nYour Personal Details\nYour Password".into(),
                errors: 0,
                errors_after: 0,
                queries: AtomicU32::new(0),
                broken: false,
                detached: false,
            }
        }
    }

    #[async_trait]
    impl PageDriver for StaticPage {
        async fn navigate(&self, _url: &str) -> Result<(), DriverError> {
            Ok(())
        }

        async fn find_by_role(&self, target: &ElementRef) -> Result<ElementHandle, DriverError> {
            if self.broken {
                return Err(DriverError::Closed);
            }
            self.elements
                .iter()
                .position(|(e, _)| e.role == target.role && target.matches_name(&e.name))
                .map(|i| ElementHandle::new(i.to_string()))
                .ok_or_else(|| DriverError::NotFound(target.to_string()))
        }

        async fn fill(&self, _element: &ElementHandle, _text: &str) -> Result<(), DriverError> {
            Ok(())
        }

        async fn click(&self, _element: &ElementHandle) -> Result<(), DriverError> {
            Ok(())
        }

        async fn select_option(&self, _element: &ElementHandle, _option: &str) -> Result<(), DriverError> {
            Ok(())
        }

        async fn is_visible(&self, element: &ElementHandle) -> Result<bool, DriverError> {
            let index: usize = element
                .id()
                .parse()
                .map_err(|_| DriverError::NotFound(element.id().to_string()))?;
            Ok(self.elements[index].1)
        }

        async fn text_content(&self, _scope: TextScope<'_>) -> Result<String, DriverError> {
            if self.detached {
                return Err(DriverError::NotFound("body".into()));
            }
            Ok(self.text.clone())
        }

        async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, DriverError> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst);
            if self.detached {
                return Err(DriverError::NotFound(selector.to_string()));
            }
            if n < self.errors_after {
                return Ok(Vec::new());
            }
            Ok((0..self.errors)
                .map(|i| ElementHandle::new(format!("error-{i}")))
                .collect())
        }
    }

    fn evaluator() -> AssertionEvaluator {
        AssertionEvaluator::new(WaitPolicy::new(
            Duration::from_millis(500),
            Duration::from_millis(100),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_expectations_hold() {
        let page = StaticPage::new();
        let expectations = vec![
            Expectation::visible(ElementRef::exact("heading", "Register")),
            Expectation::not_visible(ElementRef::exact("textbox", "Honeypot")),
            Expectation::not_visible(ElementRef::exact("link", "Log out")),
            Expectation::text_present("Your Personal Details"),
            Expectation::text_absent("registration completed"),
        ];

        assert_eq!(evaluator().evaluate(&expectations, &page).await, Verdict::Passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_failing_expectation_is_reported() {
        let page = StaticPage::new();
        let failing = Expectation::text_present("Your registration completed");
        let expectations = vec![
            Expectation::visible(ElementRef::exact("heading", "Register")),
            failing.clone(),
            Expectation::visible(ElementRef::exact("link", "Log out")),
        ];

        match evaluator().evaluate(&expectations, &page).await {
            Verdict::Failed { expectation, reason } => {
                assert_eq!(expectation, failing);
                assert!(reason.contains("within 500 ms"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_element_fails_not_errors() {
        let page = StaticPage::new();
        let expectations = vec![Expectation::visible(ElementRef::new("link", "jane@example.com"))];

        let verdict = evaluator().evaluate(&expectations, &page).await;
        assert!(verdict.is_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_element_is_not_visible() {
        let page = StaticPage::new();
        let expectations = vec![Expectation::visible(ElementRef::exact("textbox", "Honeypot"))];

        match evaluator().evaluate(&expectations, &page).await {
            Verdict::Failed { reason, .. } => assert!(reason.contains("hidden")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_waits_for_late_errors() {
        let mut page = StaticPage::new();
        page.errors = 2;
        page.errors_after = 3;

        let expectations = vec![Expectation::count_at_least("[role=\"alert\"]", 2)];
        assert_eq!(evaluator().evaluate(&expectations, &page).await, Verdict::Passed);
        assert_eq!(page.queries.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_zero_holds_without_query() {
        let page = StaticPage::new();
        let expectations = vec![Expectation::count_at_least(".error", 0)];

        assert_eq!(evaluator().evaluate(&expectations, &page).await, Verdict::Passed);
        assert_eq!(page.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_requires_at_least_n() {
        let mut page = StaticPage::new();
        page.errors = 1;

        let expectations = vec![Expectation::count_at_least(".error", 2)];
        match evaluator().evaluate(&expectations, &page).await {
            Verdict::Failed { reason, .. } => assert!(reason.contains("1 matching element(s)")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_fault_is_errored() {
        let mut page = StaticPage::new();
        page.broken = true;

        let expectations = vec![Expectation::visible(ElementRef::exact("heading", "Register"))];
        let verdict = evaluator().evaluate(&expectations, &page).await;
        assert!(matches!(
            verdict,
            Verdict::Errored {
                cause: ExecutionError::DriverFault(_)
            }
        ));
    }

    #[test_case(Expectation::text_present("Your registration completed") ; "text present")]
    #[test_case(Expectation::text_absent("Register") ; "text absent")]
    #[test_case(Expectation::count_at_least(".error", 1) ; "count at least")]
    #[tokio::test(start_paused = true)]
    async fn test_unreachable_page_content_fails(expectation: Expectation) {
        let mut page = StaticPage::new();
        page.detached = true;

        match evaluator().evaluate(std::slice::from_ref(&expectation), &page).await {
            Verdict::Failed { expectation: unmet, .. } => assert_eq!(unmet, expectation),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
