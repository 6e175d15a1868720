//! End-to-end harness scenarios against the in-memory device model.

use appwarden::prelude::*;
use appwarden::{is_logged_in, ACQUIRE_ATTEMPTS};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const APP: &str = "com.example.shop";

fn indicator() -> Locator {
    Locator::accessibility_id("More")
}

fn login_button() -> Locator {
    Locator::accessibility_id("Log in")
}

/// Route harness logs through the test writer so failing scenarios show them
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("appwarden=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn config(screenshots: &Path) -> HarnessConfig {
    init_tracing();
    HarnessConfig::new(CapabilityConfig::android(APP).with_device_name("Pixel 8"))
        .with_settle(SettleDelays::none())
        .with_timeouts(Timeouts {
            wait_ms: 50,
            poll_ms: 5,
            ..Timeouts::default()
        })
        .with_screenshot_dir(screenshots)
        .with_app(AppProfile {
            logged_in_indicator: Some(indicator()),
            logout: Some(LogoutProfile {
                menu: indicator(),
                entry: Locator::xpath("//ScrollView/View[12]"),
                entry_needs_scroll: true,
                confirm: Locator::xpath("//TextView[@text='Confirm']"),
            }),
        })
}

/// Shop app: login button while logged out, account menu with a logout
/// entry two swipes down while logged in, and a footer three swipes down.
fn shop_app() -> MockDriver {
    MockDriver::new()
        .with_element(
            MockElement::new("login", login_button())
                .visible_when(Visibility::LoggedOut)
                .on_click(MockAction::LogIn),
        )
        .with_element(MockElement::new("more", indicator()).visible_when(Visibility::LoggedIn))
        .with_element(
            MockElement::new("logout", Locator::xpath("//ScrollView/View[12]"))
                .visible_when(Visibility::LoggedIn)
                .after_scrolls(2),
        )
        .with_element(
            MockElement::new("confirm", Locator::xpath("//TextView[@text='Confirm']"))
                .visible_when(Visibility::LoggedIn)
                .on_click(MockAction::LogOut),
        )
        .with_element(MockElement::new("footer", Locator::id("footer")).after_scrolls(3))
        .with_element(
            MockElement::new("title", Locator::id("title")).with_attribute("text", "Shop"),
        )
}

fn png_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, |entries| {
        entries
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
            .count()
    })
}

// =============================================================================
// Scenario A: logged-in app is logged out and restarted
// =============================================================================

#[test]
fn scenario_a_logged_in_app_is_reset() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut mgr = SessionManager::from_config(shop_app().logged_in(), &config);

    let report = AppStateReset::new(&config).run(&mut mgr).unwrap();
    assert!(report.was_logged_in);
    assert!(report.logout.as_ref().is_some_and(|s| s.is_logged_out()));
    assert_eq!(report.recovered_by, RecoveryStrategy::Restart);

    let (driver, session) = mgr.parts_mut().unwrap();
    let id = session.id().clone();
    assert!(!is_logged_in(driver, &id, &indicator()));
    assert_eq!(driver.launches, 2);
    assert!(driver.was_called(&format!("terminate:{APP}")));
}

// =============================================================================
// Scenario B: terminate and activate both raise, force-stop recovers
// =============================================================================

#[test]
fn scenario_b_force_stop_fallback() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut driver = shop_app();
    driver.terminate_failures = 1;
    driver.activate_failures = 1;
    let mut mgr = SessionManager::from_config(driver, &config);

    let report = AppStateReset::new(&config).run(&mut mgr).unwrap();
    assert_eq!(report.recovered_by, RecoveryStrategy::ForceStop);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].strategy, RecoveryStrategy::Restart);

    let driver = mgr.driver();
    let shell = driver
        .history()
        .iter()
        .find(|c| c.starts_with("execute:mobile: shell"))
        .unwrap();
    assert!(shell.contains("force-stop"));
    assert!(shell.contains(APP));
    assert_eq!(driver.force_stops, 1);
    assert_eq!(driver.count_calls("activate:"), 2);
    assert!(driver.app_running);
}

// =============================================================================
// Scenario C: element three swipes down, budget of five
// =============================================================================

#[test]
fn scenario_c_scroll_search_stops_when_found() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut mgr = SessionManager::from_config(shop_app(), &config);
    let finder = ResilientLocator::new(config.scroll.gesture, Duration::ZERO);

    let (driver, session) = mgr.acquire_with_driver().unwrap();
    let found = finder
        .find(driver, session.id(), &Locator::id("footer"), 5)
        .unwrap();
    assert_eq!(found.element.id, "footer");
    assert_eq!(found.scrolls, 3);
    assert_eq!(found.attempts, 4);
    assert_eq!(driver.swipes(), 3);

    // Already on screen: no further gestures
    let again = finder
        .find(driver, session.id(), &Locator::id("footer"), 5)
        .unwrap();
    assert_eq!(again.scrolls, 0);
    assert_eq!(driver.swipes(), 3);
}

#[test]
fn exhausted_scroll_search_is_distinguishable() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut mgr = SessionManager::from_config(shop_app(), &config);
    let finder = ResilientLocator::new(config.scroll.gesture, Duration::ZERO);

    let (driver, session) = mgr.acquire_with_driver().unwrap();
    let direct = driver
        .find_element(session.id(), &Locator::id("missing"))
        .unwrap_err();
    let searched = finder
        .find(driver, session.id(), &Locator::id("missing"), 3)
        .unwrap_err();

    assert!(direct.is_no_such_element());
    assert!(!direct.is_not_found());
    assert!(searched.is_not_found());
    assert!(matches!(
        searched,
        HarnessError::ElementNotFound { attempts: 3, .. }
    ));
    assert_eq!(driver.swipes(), 2);
}

// =============================================================================
// Scenario D: invalid handle first, valid handle second
// =============================================================================

#[test]
fn scenario_d_invalid_handle_is_replaced() {
    let mut driver = shop_app();
    driver.queue_session("stale-handle", false);
    driver.queue_session("fresh-handle", true);
    let mut mgr = SessionManager::new(driver, "http://127.0.0.1:4723", CapabilityConfig::android(APP));

    let session = mgr.acquire().unwrap();
    assert_eq!(session.id().as_str(), "fresh-handle");
    assert!(mgr.driver().was_called("close:stale-handle"));
    assert_eq!(
        mgr.driver().count_calls("open_session"),
        ACQUIRE_ATTEMPTS as usize
    );
}

#[test]
fn release_on_dead_handle_does_not_raise() {
    let mut mgr = SessionManager::new(shop_app(), "http://127.0.0.1:4723", CapabilityConfig::android(APP));
    let id = mgr.acquire().unwrap().id().clone();
    mgr.driver_mut().kill_session(&id);

    mgr.release();
    mgr.release();
    assert!(mgr.session().is_none());
}

// =============================================================================
// Harness-level properties
// =============================================================================

#[test]
fn tests_sharing_a_session_each_start_clean() {
    let tmp = tempfile::tempdir().unwrap();
    let harness = TestHarness::new(config(tmp.path()));
    let mut mgr = SessionManager::from_config(shop_app().logged_in(), harness.config());

    let mut suite = TestSuite::new("shared");
    for i in 0..4 {
        suite.add_test(TestCase::new(format!("login_{i}"), |ctx: &mut TestContext<'_, MockDriver>| {
            if ctx.is_present(&indicator()) || !ctx.is_present(&login_button()) {
                return Err(HarnessError::assertion("test started logged in"));
            }
            if ctx.driver().scroll_offset != 0 {
                return Err(HarnessError::assertion("test did not start on a fresh launch"));
            }
            ctx.click(&login_button())?;
            let _ = ctx.find_scrolling(&Locator::id("footer"))?;
            Ok(())
        }));
    }

    let results = harness.run(&mut mgr, &mut suite);
    assert_eq!(results.passed_count(), 4, "{:?}", results.failures());
    assert_eq!(mgr.driver().count_calls("open_session"), 1);
    assert!(results
        .results
        .iter()
        .all(|r| r.recovered_by == Some(RecoveryStrategy::Restart)));
}

#[test]
fn one_screenshot_per_failing_test() {
    let tmp = tempfile::tempdir().unwrap();
    let shots = tmp.path().join("screenshots");
    let harness = TestHarness::new(config(&shots));
    let mut mgr = SessionManager::from_config(shop_app(), harness.config());

    let mut suite = TestSuite::new("mixed")
        .with_test(TestCase::new("passes", |ctx: &mut TestContext<'_, MockDriver>| {
            ctx.expect_text(&Locator::id("title"), "Shop")
        }))
        .with_test(TestCase::new("wrong_title", |ctx: &mut TestContext<'_, MockDriver>| {
            ctx.expect_text(&Locator::id("title"), "Cart")
        }))
        .with_test(TestCase::new("missing_button", |ctx: &mut TestContext<'_, MockDriver>| {
            ctx.find_scrolling_with(&Locator::id("checkout"), 2).map(|_| ())
        }))
        .with_test(TestCase::new("also_passes", |_: &mut TestContext<'_, MockDriver>| Ok(())));

    let results = harness.run(&mut mgr, &mut suite);
    assert_eq!(results.passed_count(), 2);
    assert_eq!(results.failed_count(), 2);
    assert_eq!(png_count(&shots), 2);
    assert_eq!(mgr.driver().count_calls("screenshot"), 2);

    for result in &results.results {
        assert_eq!(result.screenshot().is_some(), !result.passed());
    }
    match &results.results[2].outcome {
        TestOutcome::Failed { message, .. } => assert!(message.contains("checkout")),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn exhausted_reset_errors_only_that_test() {
    let tmp = tempfile::tempdir().unwrap();
    let harness = TestHarness::new(config(tmp.path()));
    let mut mgr = SessionManager::from_config(shop_app(), harness.config());
    let _ = mgr.acquire().unwrap();
    {
        let driver = mgr.driver_mut();
        driver.terminate_failures = 1;
        driver.execute_failures = 1;
        driver.open_failures = 2;
    }

    let mut suite = TestSuite::new("s")
        .with_test(TestCase::new("first", |_: &mut TestContext<'_, MockDriver>| Ok(())))
        .with_test(TestCase::new("second", |_: &mut TestContext<'_, MockDriver>| Ok(())));

    let results = harness.run(&mut mgr, &mut suite);
    match &results.results[0].outcome {
        TestOutcome::Errored { reason } => {
            assert!(reason.contains("restart"));
            assert!(reason.contains("force-stop"));
            assert!(reason.contains("reacquire"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(results.results[1].passed());
    assert!(!mgr.is_poisoned());
}

fn log_in_clean(ctx: &mut TestContext<'_, MockDriver>) -> HarnessResult<()> {
    if ctx.is_present(&indicator()) || ctx.driver().scroll_offset != 0 {
        return Err(HarnessError::assertion("test did not start clean"));
    }
    ctx.click(&login_button())
}

#[test]
fn session_killed_between_tests_is_reacquired() {
    let tmp = tempfile::tempdir().unwrap();
    let harness = TestHarness::new(config(tmp.path()));
    let mut mgr = SessionManager::from_config(shop_app(), harness.config());

    let mut before = TestSuite::new("before").with_test(TestCase::new("login_first", log_in_clean));
    let mut after = TestSuite::new("after").with_test(TestCase::new("login_second", log_in_clean));

    let first = harness.run(&mut mgr, &mut before);
    assert!(first.all_passed(), "{:?}", first.failures());
    assert!(!mgr.driver().logged_in);
    let dead = mgr.session().unwrap().id().clone();

    // The backend drops the session behind the manager's back
    mgr.driver_mut().kill_session(&dead);

    let second = harness.run(&mut mgr, &mut after);
    assert!(second.all_passed(), "{:?}", second.failures());
    assert_eq!(
        second.results[0].recovered_by,
        Some(RecoveryStrategy::Reacquire)
    );
    assert_eq!(mgr.driver().count_calls("open_session"), 2);
    assert_ne!(mgr.session().unwrap().id(), &dead);
    assert!(!mgr.driver().was_called(&format!("close:{dead}")));
}
