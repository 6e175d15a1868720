//! Test harness for running suites against a live session.
//!
//! Per test: ensure a session, reset app state, run the body, screenshot
//! on failure, then log out best-effort. Tests run strictly one after the
//! other on the scope's single session.

use crate::capture::FailureCapture;
use crate::config::HarnessConfig;
use crate::context::TestContext;
use crate::driver::AutomationDriver;
use crate::reset::{AppStateReset, RecoveryStrategy};
use crate::result::{HarnessError, HarnessResult};
use crate::session::{SessionManager, SessionScope};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Boxed test body
pub type TestBody<D> = Box<dyn FnMut(&mut TestContext<'_, D>) -> HarnessResult<()>>;

/// A single test case
pub struct TestCase<D: AutomationDriver> {
    /// Test name, also used for the screenshot file name
    pub name: String,
    body: TestBody<D>,
}

impl<D: AutomationDriver> TestCase<D> {
    /// Create a new test case
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnMut(&mut TestContext<'_, D>) -> HarnessResult<()> + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }
}

impl<D: AutomationDriver> std::fmt::Debug for TestCase<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A test suite containing multiple tests
#[derive(Debug)]
pub struct TestSuite<D: AutomationDriver> {
    /// Suite name
    pub name: String,
    /// Tests in this suite
    pub tests: Vec<TestCase<D>>,
}

impl<D: AutomationDriver> TestSuite<D> {
    /// Create a new test suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
        }
    }

    /// Add a test case
    pub fn add_test(&mut self, test: TestCase<D>) {
        self.tests.push(test);
    }

    /// Add a test case, builder style
    #[must_use]
    pub fn with_test(mut self, test: TestCase<D>) -> Self {
        self.tests.push(test);
        self
    }

    /// Get the number of tests
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }
}

/// How a test ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    /// Body returned `Ok`
    Passed,
    /// Body returned an error or panicked
    Failed {
        /// Failure message
        message: String,
        /// Screenshot taken at failure, if one could be captured
        screenshot: Option<PathBuf>,
    },
    /// The harness could not give the test a working session or app state
    Errored {
        /// Cause
        reason: String,
    },
    /// Not run because an earlier test failed in fail-fast mode
    Skipped,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Outcome
    pub outcome: TestOutcome,
    /// Rung that reset the app before the test
    pub recovered_by: Option<RecoveryStrategy>,
    /// Wall time including reset and teardown
    pub duration_ms: u64,
}

impl TestResult {
    /// Whether the test passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.outcome, TestOutcome::Passed)
    }

    /// Screenshot attached to a failure
    #[must_use]
    pub fn screenshot(&self) -> Option<&PathBuf> {
        match &self.outcome {
            TestOutcome::Failed { screenshot, .. } => screenshot.as_ref(),
            _ => None,
        }
    }

    fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: TestOutcome::Skipped,
            recovered_by: None,
            duration_ms: 0,
        }
    }
}

/// Results from running a test suite
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResults {
    /// Suite name
    pub suite_name: String,
    /// Individual test results
    pub results: Vec<TestResult>,
    /// Total duration
    pub duration_ms: u64,
}

impl SuiteResults {
    /// Check if all tests passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(TestResult::passed)
    }

    /// Count passed tests
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(|o| matches!(o, TestOutcome::Passed))
    }

    /// Count failed tests
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, TestOutcome::Failed { .. }))
    }

    /// Count errored tests
    #[must_use]
    pub fn errored_count(&self) -> usize {
        self.count(|o| matches!(o, TestOutcome::Errored { .. }))
    }

    /// Count skipped tests
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, TestOutcome::Skipped))
    }

    /// Get total test count
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Tests that did not pass
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results.iter().filter(|r| !r.passed()).collect()
    }

    /// Pretty JSON for external reporters
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn count(&self, pred: impl Fn(&TestOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Test harness for running suites
#[derive(Debug, Clone)]
pub struct TestHarness {
    config: HarnessConfig,
    /// Whether to stop on first failure
    pub fail_fast: bool,
    /// Only run tests whose name contains this
    pub filter: Option<String>,
}

impl TestHarness {
    /// Create a new test harness
    #[must_use]
    pub const fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            fail_fast: false,
            filter: None,
        }
    }

    /// Enable fail-fast mode
    #[must_use]
    pub const fn with_fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Only run tests whose name contains `pattern`
    #[must_use]
    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    /// Configuration the harness runs with
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run a test suite on the manager's session
    pub fn run<D: AutomationDriver>(
        &self,
        manager: &mut SessionManager<D>,
        suite: &mut TestSuite<D>,
    ) -> SuiteResults {
        let mut stopped = false;
        self.run_suite(manager, suite, &mut stopped)
    }

    /// Run several suites, honouring the configured session scope
    pub fn run_all<D: AutomationDriver>(
        &self,
        manager: &mut SessionManager<D>,
        suites: &mut [TestSuite<D>],
    ) -> Vec<SuiteResults> {
        let mut stopped = false;
        let mut all = Vec::with_capacity(suites.len());
        for suite in suites.iter_mut() {
            all.push(self.run_suite(manager, suite, &mut stopped));
            if self.config.scope == SessionScope::Group {
                manager.end_scope();
            }
        }
        all
    }

    fn run_suite<D: AutomationDriver>(
        &self,
        manager: &mut SessionManager<D>,
        suite: &mut TestSuite<D>,
        stopped: &mut bool,
    ) -> SuiteResults {
        let start = Instant::now();
        let mut results = Vec::new();
        info!(suite = %suite.name, tests = suite.test_count(), "running suite");

        for case in &mut suite.tests {
            if let Some(filter) = &self.filter {
                if !case.name.contains(filter.as_str()) {
                    continue;
                }
            }
            if *stopped {
                results.push(TestResult::skipped(&case.name));
                continue;
            }

            let result = self.run_test(manager, case);
            info!(test = %case.name, outcome = ?result.outcome, "test finished");
            if self.fail_fast && !result.passed() {
                *stopped = true;
            }
            results.push(result);
        }

        SuiteResults {
            suite_name: suite.name.clone(),
            results,
            duration_ms: millis(start),
        }
    }

    fn run_test<D: AutomationDriver>(
        &self,
        manager: &mut SessionManager<D>,
        case: &mut TestCase<D>,
    ) -> TestResult {
        let start = Instant::now();
        let reset = AppStateReset::new(&self.config);
        let finish = |outcome: TestOutcome, recovered_by: Option<RecoveryStrategy>| TestResult {
            name: case.name.clone(),
            outcome,
            recovered_by,
            duration_ms: millis(start),
        };

        let report = match reset.run(manager) {
            Ok(report) => report,
            Err(e) => {
                warn!(test = %case.name, error = %e, "app state reset failed");
                return finish(
                    TestOutcome::Errored {
                        reason: e.to_string(),
                    },
                    None,
                );
            }
        };

        let body_result = match manager.parts_mut() {
            Some((driver, session)) => {
                let mut ctx = TestContext::new(driver, session, &self.config);
                run_body(&mut case.body, &mut ctx)
            }
            None => Err(HarnessError::SessionUnavailable {
                attempts: 0,
                message: "session lost after reset".to_string(),
            }),
        };

        let outcome = match body_result {
            Ok(()) => TestOutcome::Passed,
            Err(e) if e.is_session_error() => {
                manager.invalidate();
                TestOutcome::Errored {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                let capture = FailureCapture::from_config(&self.config);
                let screenshot = manager
                    .parts_mut()
                    .and_then(|(driver, session)| capture.capture(driver, session.id(), &case.name));
                TestOutcome::Failed {
                    message: e.to_string(),
                    screenshot,
                }
            }
        };

        if !matches!(outcome, TestOutcome::Errored { .. }) {
            if let Some((driver, session)) = manager.parts_mut() {
                let _ = reset.teardown(driver, session);
            }
        }

        finish(outcome, Some(report.recovered_by))
    }
}

fn run_body<D: AutomationDriver>(
    body: &mut TestBody<D>,
    ctx: &mut TestContext<'_, D>,
) -> HarnessResult<()> {
    panic::catch_unwind(AssertUnwindSafe(|| body(ctx)))
        .unwrap_or_else(|payload| Err(HarnessError::assertion(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "test panicked".to_string()
    }
}

fn millis(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityConfig;
    use crate::config::SettleDelays;
    use crate::locator::Locator;
    use crate::mock::{MockDriver, MockElement};

    fn config(dir: &std::path::Path) -> HarnessConfig {
        HarnessConfig::new(CapabilityConfig::android("com.example.app"))
            .with_settle(SettleDelays::none())
            .with_screenshot_dir(dir)
    }

    fn case<F>(name: &str, body: F) -> TestCase<MockDriver>
    where
        F: FnMut(&mut TestContext<'_, MockDriver>) -> HarnessResult<()> + 'static,
    {
        TestCase::new(name, body)
    }

    fn app() -> MockDriver {
        MockDriver::new().with_element(
            MockElement::new("title", Locator::id("title")).with_attribute("text", "Home"),
        )
    }

    mod result_tests {
        use super::*;

        #[test]
        fn test_counts_and_json() {
            let results = SuiteResults {
                suite_name: "s".into(),
                results: vec![
                    TestResult {
                        name: "a".into(),
                        outcome: TestOutcome::Passed,
                        recovered_by: Some(RecoveryStrategy::Restart),
                        duration_ms: 3,
                    },
                    TestResult {
                        name: "b".into(),
                        outcome: TestOutcome::Errored {
                            reason: "x".into(),
                        },
                        recovered_by: None,
                        duration_ms: 1,
                    },
                    TestResult::skipped("c"),
                ],
                duration_ms: 4,
            };
            assert_eq!(results.total(), 3);
            assert_eq!(results.passed_count(), 1);
            assert_eq!(results.errored_count(), 1);
            assert_eq!(results.skipped_count(), 1);
            assert_eq!(results.failures().len(), 2);
            assert!(!results.all_passed());

            let json: serde_json::Value = serde_json::from_str(&results.to_json().unwrap()).unwrap();
            assert_eq!(json["results"][0]["outcome"]["status"], "passed");
            assert_eq!(json["results"][0]["recovered_by"], "restart");
            assert_eq!(json["results"][1]["outcome"]["reason"], "x");
        }

        #[test]
        fn test_panic_message() {
            let payload: Box<dyn Any + Send> = Box::new("boom");
            assert_eq!(panic_message(payload.as_ref()), "boom");
            let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
            assert_eq!(panic_message(payload.as_ref()), "bang");
            let payload: Box<dyn Any + Send> = Box::new(7_u8);
            assert_eq!(panic_message(payload.as_ref()), "test panicked");
        }
    }

    mod run_tests {
        use super::*;

        #[test]
        fn test_pass_fail_and_panic() {
            let tmp = tempfile::tempdir().unwrap();
            let harness = TestHarness::new(config(tmp.path()));
            let mut mgr = SessionManager::from_config(app(), harness.config());
            let mut suite = TestSuite::new("home")
                .with_test(case("title_shown", |ctx| {
                    ctx.expect_text(&Locator::id("title"), "Home")
                }))
                .with_test(case("title_wrong", |ctx| {
                    ctx.expect_text(&Locator::id("title"), "Away")
                }))
                .with_test(case("panics", |_| panic!("boom")));

            let results = harness.run(&mut mgr, &mut suite);
            assert_eq!(results.passed_count(), 1);
            assert_eq!(results.failed_count(), 2);

            let shots = results.results.iter().filter(|r| r.screenshot().is_some()).count();
            assert_eq!(shots, 2);
            assert!(results.results[0].screenshot().is_none());
            match &results.results[2].outcome {
                TestOutcome::Failed { message, .. } => assert!(message.contains("boom")),
                other => panic!("unexpected outcome {other:?}"),
            }
            assert_eq!(mgr.driver().count_calls("open_session"), 1);
            assert_eq!(mgr.driver().count_calls("screenshot"), 2);
        }

        #[test]
        fn test_fail_fast_skips_rest() {
            let tmp = tempfile::tempdir().unwrap();
            let harness = TestHarness::new(config(tmp.path())).with_fail_fast();
            let mut mgr = SessionManager::from_config(app(), harness.config());
            let mut suite = TestSuite::new("s")
                .with_test(case("first", |_| Err(HarnessError::assertion("no"))))
                .with_test(case("second", |_| Ok(())));

            let results = harness.run(&mut mgr, &mut suite);
            assert_eq!(results.failed_count(), 1);
            assert_eq!(results.results[1].outcome, TestOutcome::Skipped);
        }

        #[test]
        fn test_filter_selects_by_name() {
            let tmp = tempfile::tempdir().unwrap();
            let harness = TestHarness::new(config(tmp.path())).with_filter("login");
            let mut mgr = SessionManager::from_config(app(), harness.config());
            let mut suite = TestSuite::new("s")
                .with_test(case("test_login_ok", |_| Ok(())))
                .with_test(case("test_signup_ok", |_| Ok(())));

            let results = harness.run(&mut mgr, &mut suite);
            assert_eq!(results.total(), 1);
            assert_eq!(results.results[0].name, "test_login_ok");
        }

        #[test]
        fn test_poisoned_scope_errors_every_test() {
            let tmp = tempfile::tempdir().unwrap();
            let harness = TestHarness::new(config(tmp.path()));
            let mut driver = app();
            driver.open_failures = 2;
            let mut mgr = SessionManager::from_config(driver, harness.config());
            let mut suite = TestSuite::new("s")
                .with_test(case("a", |_| Ok(())))
                .with_test(case("b", |_| Ok(())));

            let results = harness.run(&mut mgr, &mut suite);
            assert_eq!(results.errored_count(), 2);
            assert_eq!(mgr.driver().count_calls("open_session"), 2);
            match &results.results[1].outcome {
                TestOutcome::Errored { reason } => assert!(reason.contains("poisoned")),
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        #[test]
        fn test_session_loss_in_body_is_errored_and_recovered() {
            let tmp = tempfile::tempdir().unwrap();
            let harness = TestHarness::new(config(tmp.path()));
            let mut mgr = SessionManager::from_config(app(), harness.config());
            let mut suite = TestSuite::new("s")
                .with_test(case("kills_session", |ctx| {
                    let id = ctx.session().id().clone();
                    ctx.driver().kill_session(&id);
                    ctx.find(&Locator::id("title")).map(|_| ())
                }))
                .with_test(case("after", |ctx| {
                    ctx.expect_text(&Locator::id("title"), "Home")
                }));

            let results = harness.run(&mut mgr, &mut suite);
            assert!(matches!(results.results[0].outcome, TestOutcome::Errored { .. }));
            assert!(results.results[1].passed());
            assert_eq!(mgr.driver().count_calls("screenshot"), 0);
            assert_eq!(mgr.driver().count_calls("open_session"), 2);
        }

        #[test]
        fn test_group_scope_opens_session_per_suite() {
            let tmp = tempfile::tempdir().unwrap();
            let harness = TestHarness::new(config(tmp.path()).with_scope(SessionScope::Group));
            let mut mgr = SessionManager::from_config(app(), harness.config());
            let mut suites = vec![
                TestSuite::new("one").with_test(case("a", |_| Ok(()))),
                TestSuite::new("two").with_test(case("b", |_| Ok(()))),
            ];

            let results = harness.run_all(&mut mgr, &mut suites);
            assert!(results.iter().all(SuiteResults::all_passed));
            assert_eq!(mgr.driver().count_calls("open_session"), 2);
            assert!(mgr.session().is_none());
        }
    }
}
