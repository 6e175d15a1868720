//! Locators and resilient, scroll-aware element lookup.
//!
//! A [`Locator`] is a pure strategy + query pair. [`ResilientLocator`]
//! finds elements that may sit below the fold: direct lookup first, then
//! one swipe between attempts until the attempt budget runs out.
//!
//! Exhaustion is reported as `HarnessError::ElementNotFound`, never as an
//! empty result, so callers can tell "not scrolled into view" apart from a
//! true negative.

use crate::driver::{AutomationDriver, ElementRef, Point, SessionId, Swipe, WindowSize};
use crate::result::{HarnessError, HarnessResult};
use crate::wait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Default lookup budget for scroll searches
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Element lookup strategy (W3C `using` value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// XPath query over the native view hierarchy
    #[serde(rename = "xpath")]
    XPath,
    /// Accessibility identifier (content-desc / accessibilityIdentifier)
    #[serde(rename = "accessibility id", alias = "accessibility-id")]
    AccessibilityId,
    /// Native resource id
    #[serde(rename = "id")]
    Id,
    /// Native class name
    #[serde(rename = "class name", alias = "class-name")]
    ClassName,
    /// UiAutomator selector expression (Android)
    #[serde(rename = "-android uiautomator", alias = "android-uiautomator")]
    AndroidUiAutomator,
    /// NSPredicate string (iOS)
    #[serde(rename = "-ios predicate string", alias = "ios-predicate")]
    IosPredicate,
    /// Class chain query (iOS)
    #[serde(rename = "-ios class chain", alias = "ios-class-chain")]
    IosClassChain,
}

impl Strategy {
    /// All strategies
    pub const ALL: [Self; 7] = [
        Self::XPath,
        Self::AccessibilityId,
        Self::Id,
        Self::ClassName,
        Self::AndroidUiAutomator,
        Self::IosPredicate,
        Self::IosClassChain,
    ];

    /// Value sent as `using` in find-element requests
    #[must_use]
    pub const fn as_w3c(self) -> &'static str {
        match self {
            Self::XPath => "xpath",
            Self::AccessibilityId => "accessibility id",
            Self::Id => "id",
            Self::ClassName => "class name",
            Self::AndroidUiAutomator => "-android uiautomator",
            Self::IosPredicate => "-ios predicate string",
            Self::IosClassChain => "-ios class chain",
        }
    }

    /// Short name used in logs and on the command line
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::XPath => "xpath",
            Self::AccessibilityId => "accessibility-id",
            Self::Id => "id",
            Self::ClassName => "class-name",
            Self::AndroidUiAutomator => "android-uiautomator",
            Self::IosPredicate => "ios-predicate",
            Self::IosClassChain => "ios-class-chain",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for Strategy {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.short_name() == s || st.as_w3c() == s)
            .ok_or_else(|| HarnessError::config(format!("unknown locator strategy `{s}`")))
    }
}

/// A strategy + query pair identifying a UI element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// Lookup strategy
    pub strategy: Strategy,
    /// Strategy-specific query string
    pub query: String,
}

impl Locator {
    /// Create a locator
    #[must_use]
    pub fn new(strategy: Strategy, query: impl Into<String>) -> Self {
        Self {
            strategy,
            query: query.into(),
        }
    }

    /// XPath locator
    #[must_use]
    pub fn xpath(query: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, query)
    }

    /// Accessibility id locator
    #[must_use]
    pub fn accessibility_id(id: impl Into<String>) -> Self {
        Self::new(Strategy::AccessibilityId, id)
    }

    /// Resource id locator
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Strategy::Id, id)
    }

    /// Class name locator
    #[must_use]
    pub fn class_name(name: impl Into<String>) -> Self {
        Self::new(Strategy::ClassName, name)
    }

    /// iOS predicate locator
    #[must_use]
    pub fn ios_predicate(predicate: impl Into<String>) -> Self {
        Self::new(Strategy::IosPredicate, predicate)
    }

    /// Android UiAutomator locator
    #[must_use]
    pub fn android_uiautomator(selector: impl Into<String>) -> Self {
        Self::new(Strategy::AndroidUiAutomator, selector)
    }

    /// Body of a W3C find-element request
    #[must_use]
    pub fn to_w3c(&self) -> serde_json::Value {
        serde_json::json!({ "using": self.strategy.as_w3c(), "value": self.query })
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.strategy, self.query)
    }
}

/// Direction in which a scroll reveals more content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    /// Reveal content further down (finger moves up)
    #[default]
    Down,
    /// Reveal content further up (finger moves down)
    Up,
    /// Reveal content to the right (finger moves left)
    Right,
    /// Reveal content to the left (finger moves right)
    Left,
}

/// Swipe geometry as fractions of the viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollGesture {
    /// Which way content should move into view
    pub direction: ScrollDirection,
    /// Where the finger goes down, along the scroll axis
    pub start_fraction: f64,
    /// Where the finger lifts, along the scroll axis
    pub end_fraction: f64,
    /// Gesture duration in milliseconds
    pub duration_ms: u64,
}

impl Default for ScrollGesture {
    fn default() -> Self {
        Self {
            direction: ScrollDirection::Down,
            start_fraction: 0.7,
            end_fraction: 0.3,
            duration_ms: 800,
        }
    }
}

impl ScrollGesture {
    /// Set direction
    #[must_use]
    pub const fn with_direction(mut self, direction: ScrollDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Check fractions lie strictly inside the viewport and differ
    pub fn validate(&self) -> HarnessResult<()> {
        let inside = |f: f64| f > 0.0 && f < 1.0;
        if !inside(self.start_fraction) || !inside(self.end_fraction) {
            return Err(HarnessError::config(
                "scroll fractions must lie strictly between 0 and 1",
            ));
        }
        if (self.start_fraction - self.end_fraction).abs() < f64::EPSILON {
            return Err(HarnessError::config("scroll start and end fractions are equal"));
        }
        Ok(())
    }

    /// Concrete swipe for the given viewport.
    ///
    /// `start_fraction` is the far end of the axis relative to the reveal
    /// direction; for `Down` the finger travels from 70% to 30% of the
    /// height by default.
    #[must_use]
    pub fn swipe_for(&self, window: WindowSize) -> Swipe {
        let w = f64::from(window.width);
        let h = f64::from(window.height);
        let (hi, lo) = (self.start_fraction, self.end_fraction);
        let mid_x = (w * 0.5) as i32;
        let mid_y = (h * 0.5) as i32;

        let (from, to) = match self.direction {
            ScrollDirection::Down => (
                Point::new(mid_x, (h * hi) as i32),
                Point::new(mid_x, (h * lo) as i32),
            ),
            ScrollDirection::Up => (
                Point::new(mid_x, (h * lo) as i32),
                Point::new(mid_x, (h * hi) as i32),
            ),
            ScrollDirection::Right => (
                Point::new((w * hi) as i32, mid_y),
                Point::new((w * lo) as i32, mid_y),
            ),
            ScrollDirection::Left => (
                Point::new((w * lo) as i32, mid_y),
                Point::new((w * hi) as i32, mid_y),
            ),
        };

        Swipe {
            from,
            to,
            duration: Duration::from_millis(self.duration_ms),
        }
    }
}

/// Result of a scroll search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    /// Element that matched
    pub element: ElementRef,
    /// Lookups performed, including the successful one
    pub attempts: u32,
    /// Swipes performed before the element appeared
    pub scrolls: u32,
}

/// Scroll-then-retry element finder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResilientLocator {
    gesture: ScrollGesture,
    settle: Duration,
}

impl Default for ResilientLocator {
    fn default() -> Self {
        Self::new(ScrollGesture::default(), Duration::from_secs(1))
    }
}

impl ResilientLocator {
    /// Create a finder with the given gesture and post-swipe settle delay
    #[must_use]
    pub const fn new(gesture: ScrollGesture, settle: Duration) -> Self {
        Self { gesture, settle }
    }

    /// Gesture used between attempts
    #[must_use]
    pub const fn gesture(&self) -> &ScrollGesture {
        &self.gesture
    }

    /// Find `locator`, swiping between failed lookups.
    ///
    /// Performs at most `max_attempts` lookups (a budget of 0 is treated as
    /// 1) and at most `max_attempts - 1` swipes: no gesture follows the
    /// final failed lookup. Only `NoSuchElement` triggers a retry; any other
    /// driver error ends the search immediately.
    pub fn find<D: AutomationDriver + ?Sized>(
        &self,
        driver: &mut D,
        session: &SessionId,
        locator: &Locator,
        max_attempts: u32,
    ) -> HarnessResult<Found> {
        let max_attempts = max_attempts.max(1);
        let mut window: Option<WindowSize> = None;
        let mut scrolls = 0;

        for attempt in 1..=max_attempts {
            match driver.find_element(session, locator) {
                Ok(element) => {
                    debug!(%locator, attempt, scrolls, "element located");
                    return Ok(Found {
                        element,
                        attempts: attempt,
                        scrolls,
                    });
                }
                Err(e) if e.is_no_such_element() => {
                    if attempt == max_attempts {
                        break;
                    }
                    let size = match window {
                        Some(size) => size,
                        None => {
                            let size = driver.window_size(session)?;
                            window = Some(size);
                            size
                        }
                    };
                    debug!(%locator, attempt, "element not visible, swiping");
                    driver.swipe(session, &self.gesture.swipe_for(size))?;
                    scrolls += 1;
                    wait::settle(self.settle);
                }
                Err(e) => return Err(e),
            }
        }

        Err(HarnessError::ElementNotFound {
            locator: locator.to_string(),
            attempts: max_attempts,
        })
    }
}
