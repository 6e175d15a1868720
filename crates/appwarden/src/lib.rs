//! Appwarden: session lifecycle and state hygiene for Appium-driven mobile UI tests
//!
//! Keeps one remote automation session alive per scope, puts the app back
//! into a logged-out, freshly launched state before every test, finds
//! controls that sit below the fold, and screenshots failures.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    APPWARDEN Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Session    │    │ App State  │    │ Test body  │            │
//! │   │ Manager    │───►│ Reset      │───►│ (Context)  │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │         │                 │                 │                   │
//! │         │                 ▼                 ▼                   │
//! │         │          ┌────────────┐    ┌────────────┐             │
//! │         │          │ Resilient  │    │ Failure    │             │
//! │         │          │ Locator    │    │ Capture    │             │
//! │         │          └────────────┘    └────────────┘             │
//! │         ▼                                                       │
//! │   ┌──────────────────────────────────────────────┐              │
//! │   │ AutomationDriver (RemoteDriver / MockDriver) │              │
//! │   └──────────────────────────────────────────────┘              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use appwarden::prelude::*;
//!
//! let config = HarnessConfig::new(CapabilityConfig::android("com.example.app"))
//!     .with_settle(SettleDelays::none());
//! let driver = MockDriver::new().with_element(
//!     MockElement::new("title", Locator::id("title")).with_attribute("text", "Home"),
//! );
//! let mut manager = SessionManager::from_config(driver, &config);
//!
//! let mut suite = TestSuite::new("home").with_test(TestCase::<MockDriver>::new("title", |ctx| {
//!     ctx.expect_text(&Locator::id("title"), "Home")
//! }));
//! let results = TestHarness::new(config).run(&mut manager, &mut suite);
//! assert!(results.all_passed());
//! ```

#![warn(missing_docs)]

pub mod capabilities;
pub mod capture;
pub mod config;
pub mod context;
pub mod driver;
pub mod harness;
pub mod locator;
pub mod mock;
pub mod reset;
pub mod result;
pub mod session;
pub mod wait;
#[cfg(feature = "remote")]
pub mod webdriver;

pub use capabilities::{CapabilityConfig, Platform};
pub use capture::FailureCapture;
pub use config::{AppProfile, HarnessConfig, LogoutProfile, ScrollConfig, SettleDelays, Timeouts};
pub use context::TestContext;
pub use driver::{AutomationDriver, ElementRef, Point, SessionId, Swipe, WindowSize};
pub use harness::{SuiteResults, TestCase, TestHarness, TestOutcome, TestResult, TestSuite};
pub use locator::{
    Found, Locator, ResilientLocator, ScrollDirection, ScrollGesture, Strategy,
    DEFAULT_MAX_ATTEMPTS,
};
pub use mock::{MockAction, MockDriver, MockElement, Visibility};
pub use reset::{
    evaluate_ladder, is_logged_in, run_logout, AppStateReset, LogoutState, LogoutStep,
    RecoveryStrategy, ResetReport, RungFailure,
};
pub use result::{HarnessError, HarnessResult};
pub use session::{Session, SessionManager, SessionScope, ACQUIRE_ATTEMPTS};
pub use wait::{poll_until, settle, wait_for_clickable, wait_for_present, WaitOptions};
#[cfg(feature = "remote")]
pub use webdriver::RemoteDriver;

/// Everything a test file usually needs
pub mod prelude {
    pub use super::{
        AppProfile, AppStateReset, AutomationDriver, CapabilityConfig, FailureCapture,
        HarnessConfig, HarnessError, HarnessResult, Locator, LogoutProfile, MockAction,
        MockDriver, MockElement, Platform, RecoveryStrategy, ResilientLocator, ScrollDirection,
        SessionManager, SessionScope, SettleDelays, Strategy, SuiteResults, TestCase,
        TestContext, TestHarness, TestOutcome, TestSuite, Timeouts, Visibility,
    };
    #[cfg(feature = "remote")]
    pub use super::RemoteDriver;
}
