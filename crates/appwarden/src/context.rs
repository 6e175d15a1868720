//! Per-test context handed to test bodies.
//!
//! Bundles the driver, the live session and the configuration so a test
//! body never reaches for globals. Every helper is a thin composition of
//! driver calls, bounded waits and the scroll search.

use crate::capabilities::Platform;
use crate::config::HarnessConfig;
use crate::driver::{AutomationDriver, ElementRef};
use crate::locator::{Found, Locator};
use crate::result::{HarnessError, HarnessResult};
use crate::session::Session;
use crate::wait::{self, wait_for_clickable};
use std::time::Duration;
use tracing::debug;

/// What a test body sees
pub struct TestContext<'a, D: AutomationDriver + ?Sized> {
    driver: &'a mut D,
    session: &'a Session,
    config: &'a HarnessConfig,
}

impl<D: AutomationDriver + ?Sized> std::fmt::Debug for TestContext<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("session", self.session.id())
            .finish_non_exhaustive()
    }
}

impl<'a, D: AutomationDriver + ?Sized> TestContext<'a, D> {
    /// Create a context
    pub fn new(driver: &'a mut D, session: &'a Session, config: &'a HarnessConfig) -> Self {
        Self {
            driver,
            session,
            config,
        }
    }

    /// Live session
    #[must_use]
    pub const fn session(&self) -> &Session {
        self.session
    }

    /// Harness configuration
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        self.config
    }

    /// Raw driver access for commands the helpers do not cover
    pub fn driver(&mut self) -> &mut D {
        &mut *self.driver
    }

    /// Single direct lookup
    pub fn find(&mut self, locator: &Locator) -> HarnessResult<ElementRef> {
        self.driver.find_element(self.session.id(), locator)
    }

    /// All current matches
    pub fn find_all(&mut self, locator: &Locator) -> HarnessResult<Vec<ElementRef>> {
        self.driver.find_elements(self.session.id(), locator)
    }

    /// Scroll search with the configured budget
    pub fn find_scrolling(&mut self, locator: &Locator) -> HarnessResult<Found> {
        self.find_scrolling_with(locator, self.config.scroll.max_attempts)
    }

    /// Scroll search with an explicit budget
    pub fn find_scrolling_with(
        &mut self,
        locator: &Locator,
        max_attempts: u32,
    ) -> HarnessResult<Found> {
        self.config
            .resilient_locator()
            .find(&mut *self.driver, self.session.id(), locator, max_attempts)
    }

    /// Wait until the element is displayed and enabled
    pub fn wait_clickable(&mut self, locator: &Locator) -> HarnessResult<ElementRef> {
        wait_for_clickable(
            &mut *self.driver,
            self.session.id(),
            locator,
            &self.config.wait_options(),
        )
    }

    /// Wait for the control, click it, then settle
    pub fn click(&mut self, locator: &Locator) -> HarnessResult<()> {
        let element = self.wait_clickable(locator)?;
        debug!(%locator, "click");
        self.driver.click(self.session.id(), &element)?;
        wait::settle(self.config.settle.after_click());
        Ok(())
    }

    /// Wait for the field and type into it
    pub fn type_text(&mut self, locator: &Locator, text: &str) -> HarnessResult<()> {
        let element = self.wait_clickable(locator)?;
        self.driver.send_text(self.session.id(), &element, text)
    }

    /// Read an attribute of the first match
    pub fn attribute(&mut self, locator: &Locator, name: &str) -> HarnessResult<Option<String>> {
        let element = self.find(locator)?;
        self.driver.get_attribute(self.session.id(), &element, name)
    }

    /// Visible text of the first match
    pub fn text(&mut self, locator: &Locator) -> HarnessResult<Option<String>> {
        let name = match self.session.platform() {
            Platform::Android => "text",
            Platform::Ios => "label",
        };
        self.attribute(locator, name)
    }

    /// Assert the element's visible text
    pub fn expect_text(&mut self, locator: &Locator, expected: &str) -> HarnessResult<()> {
        match self.text(locator)? {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(HarnessError::assertion(format!(
                "{locator}: expected text `{expected}`, found `{actual}`"
            ))),
            None => Err(HarnessError::assertion(format!(
                "{locator}: expected text `{expected}`, element has no text"
            ))),
        }
    }

    /// Whether anything matches right now; lookup errors count as absent
    pub fn is_present(&mut self, locator: &Locator) -> bool {
        self.find_all(locator).is_ok_and(|found| !found.is_empty())
    }

    /// Fixed pause
    pub fn settle(&self, delay: Duration) {
        wait::settle(delay);
    }
}
