//! AutomationDriver - Abstract Remote Automation Trait
//!
//! The harness only needs a small slice of the remote automation protocol:
//! open/close/validate a session, find and interact with elements, take a
//! screenshot, run a raw `execute` command and manage the app process.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  AutomationDriver (trait, blocking, &mut self)              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐      ┌──────────────────────────┐ │
//! │  │  RemoteDriver        │      │  MockDriver              │ │
//! │  │  W3C WebDriver over  │      │  In-memory device model  │ │
//! │  │  HTTP (Appium)       │      │  for unit tests          │ │
//! │  └──────────────────────┘      └──────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call blocks until the remote end answers or the transport times
//! out. There is no cancellation beyond that.

use crate::capabilities::CapabilityConfig;
use crate::locator::Locator;
use crate::result::HarnessResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Identifier the remote end assigned to a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a raw session id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty ids mean the remote end never created a working session
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a remote UI element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    /// Remote element id
    pub id: String,
}

impl ElementRef {
    /// Create a new element reference
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Viewport size in device-independent pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl WindowSize {
    /// Create a new window size
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A point on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One-finger swipe gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swipe {
    /// Where the finger goes down
    pub from: Point,
    /// Where the finger lifts
    pub to: Point,
    /// Time spent moving between the two
    pub duration: Duration,
}

impl Swipe {
    /// W3C pointer action sequence for `POST /session/{id}/actions`
    #[must_use]
    pub fn to_w3c_actions(&self) -> Value {
        json!({
            "actions": [{
                "type": "pointer",
                "id": "finger1",
                "parameters": { "pointerType": "touch" },
                "actions": [
                    { "type": "pointerMove", "duration": 0, "origin": "viewport", "x": self.from.x, "y": self.from.y },
                    { "type": "pointerDown", "button": 0 },
                    { "type": "pause", "duration": 100 },
                    { "type": "pointerMove", "duration": self.duration.as_millis() as u64, "origin": "viewport", "x": self.to.x, "y": self.to.y },
                    { "type": "pointerUp", "button": 0 },
                ],
            }]
        })
    }
}

/// Abstract driver trait for remote automation
///
/// # Implementations
///
/// - `RemoteDriver` - W3C WebDriver client for an Appium endpoint
/// - `MockDriver` - For unit testing
pub trait AutomationDriver {
    /// Open a session with the given capabilities.
    ///
    /// A returned id may still be unusable; callers confirm with
    /// [`AutomationDriver::is_valid`].
    fn open_session(&mut self, capabilities: &CapabilityConfig) -> HarnessResult<SessionId>;

    /// Whether the remote end still recognises the session. Never errors.
    fn is_valid(&mut self, session: &SessionId) -> bool;

    /// Close the session
    fn close_session(&mut self, session: &SessionId) -> HarnessResult<()>;

    /// Find the first element matching the locator.
    ///
    /// Absence is reported as `HarnessError::NoSuchElement`.
    fn find_element(&mut self, session: &SessionId, locator: &Locator)
        -> HarnessResult<ElementRef>;

    /// Find all elements matching the locator (possibly none)
    fn find_elements(
        &mut self,
        session: &SessionId,
        locator: &Locator,
    ) -> HarnessResult<Vec<ElementRef>>;

    /// Displayed and enabled
    fn is_clickable(&mut self, session: &SessionId, element: &ElementRef) -> HarnessResult<bool>;

    /// Click element
    fn click(&mut self, session: &SessionId, element: &ElementRef) -> HarnessResult<()>;

    /// Type text into element
    fn send_text(
        &mut self,
        session: &SessionId,
        element: &ElementRef,
        text: &str,
    ) -> HarnessResult<()>;

    /// Read an element attribute
    fn get_attribute(
        &mut self,
        session: &SessionId,
        element: &ElementRef,
        name: &str,
    ) -> HarnessResult<Option<String>>;

    /// Capture the screen as PNG bytes
    fn screenshot(&mut self, session: &SessionId) -> HarnessResult<Vec<u8>>;

    /// Run a raw command through the `execute` endpoint (e.g. `mobile: shell`)
    fn execute(&mut self, session: &SessionId, script: &str, args: Value) -> HarnessResult<Value>;

    /// Terminate the application process
    fn terminate_app(&mut self, session: &SessionId, app_id: &str) -> HarnessResult<()>;

    /// Launch or bring the application to the foreground
    fn activate_app(&mut self, session: &SessionId, app_id: &str) -> HarnessResult<()>;

    /// Current viewport size
    fn window_size(&mut self, session: &SessionId) -> HarnessResult<WindowSize>;

    /// Perform a swipe gesture
    fn swipe(&mut self, session: &SessionId, swipe: &Swipe) -> HarnessResult<()>;
}

impl<D: AutomationDriver + ?Sized> AutomationDriver for &mut D {
    fn open_session(&mut self, capabilities: &CapabilityConfig) -> HarnessResult<SessionId> {
        (**self).open_session(capabilities)
    }

    fn is_valid(&mut self, session: &SessionId) -> bool {
        (**self).is_valid(session)
    }

    fn close_session(&mut self, session: &SessionId) -> HarnessResult<()> {
        (**self).close_session(session)
    }

    fn find_element(
        &mut self,
        session: &SessionId,
        locator: &Locator,
    ) -> HarnessResult<ElementRef> {
        (**self).find_element(session, locator)
    }

    fn find_elements(
        &mut self,
        session: &SessionId,
        locator: &Locator,
    ) -> HarnessResult<Vec<ElementRef>> {
        (**self).find_elements(session, locator)
    }

    fn is_clickable(&mut self, session: &SessionId, element: &ElementRef) -> HarnessResult<bool> {
        (**self).is_clickable(session, element)
    }

    fn click(&mut self, session: &SessionId, element: &ElementRef) -> HarnessResult<()> {
        (**self).click(session, element)
    }

    fn send_text(
        &mut self,
        session: &SessionId,
        element: &ElementRef,
        text: &str,
    ) -> HarnessResult<()> {
        (**self).send_text(session, element, text)
    }

    fn get_attribute(
        &mut self,
        session: &SessionId,
        element: &ElementRef,
        name: &str,
    ) -> HarnessResult<Option<String>> {
        (**self).get_attribute(session, element, name)
    }

    fn screenshot(&mut self, session: &SessionId) -> HarnessResult<Vec<u8>> {
        (**self).screenshot(session)
    }

    fn execute(&mut self, session: &SessionId, script: &str, args: Value) -> HarnessResult<Value> {
        (**self).execute(session, script, args)
    }

    fn terminate_app(&mut self, session: &SessionId, app_id: &str) -> HarnessResult<()> {
        (**self).terminate_app(session, app_id)
    }

    fn activate_app(&mut self, session: &SessionId, app_id: &str) -> HarnessResult<()> {
        (**self).activate_app(session, app_id)
    }

    fn window_size(&mut self, session: &SessionId) -> HarnessResult<WindowSize> {
        (**self).window_size(session)
    }

    fn swipe(&mut self, session: &SessionId, swipe: &Swipe) -> HarnessResult<()> {
        (**self).swipe(session, swipe)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod session_id_tests {
        use super::*;

        #[test]
        fn test_blank_ids() {
            assert!(SessionId::new("").is_blank());
            assert!(SessionId::new("   ").is_blank());
            assert!(SessionId::default().is_blank());
            assert!(!SessionId::new("5e1f").is_blank());
        }

        #[test]
        fn test_display() {
            assert_eq!(SessionId::new("abc").to_string(), "abc");
        }
    }

    mod swipe_tests {
        use super::*;

        #[test]
        fn test_w3c_actions_shape() {
            let swipe = Swipe {
                from: Point::new(540, 1638),
                to: Point::new(540, 702),
                duration: Duration::from_millis(800),
            };
            let payload = swipe.to_w3c_actions();
            let pointer = &payload["actions"][0];
            assert_eq!(pointer["type"], "pointer");
            assert_eq!(pointer["parameters"]["pointerType"], "touch");

            let steps = pointer["actions"].as_array().unwrap();
            assert_eq!(steps.len(), 5);
            assert_eq!(steps[0]["x"], 540);
            assert_eq!(steps[0]["y"], 1638);
            assert_eq!(steps[1]["type"], "pointerDown");
            assert_eq!(steps[3]["duration"], 800);
            assert_eq!(steps[3]["y"], 702);
            assert_eq!(steps[4]["type"], "pointerUp");
        }
    }

    mod element_ref_tests {
        use super::*;

        #[test]
        fn test_element_ref_creation() {
            let elem = ElementRef::new("00000000-0000-0001");
            assert_eq!(elem.id, "00000000-0000-0001");
        }
    }
}
