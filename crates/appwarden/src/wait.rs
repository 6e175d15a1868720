//! Bounded waits and settle delays.
//!
//! The only suspension points in the harness: poll a condition until a
//! deadline, or sleep for a fixed settle delay after a state-changing
//! action. A wait that runs out raises `HarnessError::WaitTimeout`; a hung
//! remote call blocks until the transport's own timeout fires.

use crate::driver::{AutomationDriver, ElementRef, SessionId};
use crate::locator::Locator;
use crate::result::{HarnessError, HarnessResult};
use std::time::{Duration, Instant};
use tracing::trace;

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (250ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Sleep for a settle delay; zero returns immediately
pub fn settle(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

/// Poll `check` until it yields a value or the timeout elapses.
///
/// The check runs at least once, even with a zero timeout. Session errors
/// end the wait immediately; any other error counts as "not yet".
pub fn poll_until<T, F>(options: &WaitOptions, condition: &str, mut check: F) -> HarnessResult<T>
where
    F: FnMut() -> HarnessResult<Option<T>>,
{
    let deadline = Instant::now() + options.timeout();

    loop {
        match check() {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) if e.is_session_error() => return Err(e),
            Err(e) => trace!(condition, error = %e, "wait check failed, retrying"),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(HarnessError::WaitTimeout {
                condition: condition.to_string(),
                ms: options.timeout_ms,
            });
        }
        std::thread::sleep(options.poll_interval().min(deadline - now));
    }
}

/// Wait until the element is present, displayed and enabled
pub fn wait_for_clickable<D: AutomationDriver + ?Sized>(
    driver: &mut D,
    session: &SessionId,
    locator: &Locator,
    options: &WaitOptions,
) -> HarnessResult<ElementRef> {
    let condition = format!("{locator} to be clickable");
    poll_until(options, &condition, || {
        let element = driver.find_element(session, locator)?;
        Ok(driver.is_clickable(session, &element)?.then_some(element))
    })
}

/// Wait until at least one element matches
pub fn wait_for_present<D: AutomationDriver + ?Sized>(
    driver: &mut D,
    session: &SessionId,
    locator: &Locator,
    options: &WaitOptions,
) -> HarnessResult<ElementRef> {
    let condition = format!("{locator} to be present");
    poll_until(options, &condition, || {
        Ok(driver.find_elements(session, locator)?.into_iter().next())
    })
}
