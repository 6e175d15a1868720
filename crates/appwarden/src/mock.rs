//! Mock driver for unit testing
//!
//! An in-memory model of a device running the application under test:
//! sessions that can die, an app process that can be terminated and
//! relaunched, a login flag, elements that only appear after some number
//! of swipes, and failure knobs for every recovery path the harness takes.
//! Every command is appended to a call history for verification.

use crate::capabilities::CapabilityConfig;
use crate::driver::{AutomationDriver, ElementRef, SessionId, Swipe, WindowSize};
use crate::locator::Locator;
use crate::result::{HarnessError, HarnessResult};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet, VecDeque};

/// PNG signature, enough for a file to be recognisable as a screenshot
pub const MOCK_PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// When a mock element is part of the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Whenever the app is running
    #[default]
    Always,
    /// Only while a user is logged in
    LoggedIn,
    /// Only while nobody is logged in
    LoggedOut,
}

/// Side effect of clicking a mock element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockAction {
    /// Nothing happens
    #[default]
    None,
    /// Log the user in
    LogIn,
    /// Log the user out
    LogOut,
}

/// Element on the mock screen
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Element id handed out to the harness
    pub id: String,
    /// Locator that matches this element
    pub locator: Locator,
    /// Login state it is shown in
    pub visibility: Visibility,
    /// Swipes since launch before it scrolls into view
    pub scrolls_needed: u32,
    /// Displayed and enabled
    pub clickable: bool,
    /// Attribute values
    pub attributes: BTreeMap<String, String>,
    /// Click side effect
    pub on_click: MockAction,
}

impl MockElement {
    /// Visible, clickable element with no side effects
    #[must_use]
    pub fn new(id: impl Into<String>, locator: Locator) -> Self {
        Self {
            id: id.into(),
            locator,
            visibility: Visibility::Always,
            scrolls_needed: 0,
            clickable: true,
            attributes: BTreeMap::new(),
            on_click: MockAction::None,
        }
    }

    /// Restrict to a login state
    #[must_use]
    pub const fn visible_when(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Require `n` swipes before the element is on screen
    #[must_use]
    pub const fn after_scrolls(mut self, n: u32) -> Self {
        self.scrolls_needed = n;
        self
    }

    /// Present but never clickable
    #[must_use]
    pub const fn not_clickable(mut self) -> Self {
        self.clickable = false;
        self
    }

    /// Set click side effect
    #[must_use]
    pub const fn on_click(mut self, action: MockAction) -> Self {
        self.on_click = action;
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Mock driver for unit testing
#[derive(Debug)]
pub struct MockDriver {
    /// Session ids to hand out next, with whether each one is usable
    pub planned_sessions: VecDeque<(String, bool)>,
    /// Number of upcoming `open_session` calls that fail outright
    pub open_failures: usize,
    /// Sessions the remote end still recognises
    pub live_sessions: HashSet<String>,
    /// Screen elements
    pub elements: Vec<MockElement>,
    /// Whether a user is logged in
    pub logged_in: bool,
    /// Whether the app process is running
    pub app_running: bool,
    /// Times the app was launched (session start or activate)
    pub launches: u32,
    /// Times the app was force-stopped through `execute`
    pub force_stops: u32,
    /// Swipes since the last launch
    pub scroll_offset: u32,
    /// Viewport
    pub window: WindowSize,
    /// Upcoming `terminate_app` calls that fail
    pub terminate_failures: usize,
    /// Upcoming `activate_app` calls that fail
    pub activate_failures: usize,
    /// Upcoming `execute` calls that fail
    pub execute_failures: usize,
    /// Element queries fail as if the device were unresponsive
    pub unresponsive: bool,
    /// Screenshots fail
    pub screenshot_fails: bool,
    /// Call history for verification
    pub call_history: Vec<String>,
    swipe_count: u32,
    next_session: u32,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            planned_sessions: VecDeque::new(),
            open_failures: 0,
            live_sessions: HashSet::new(),
            elements: Vec::new(),
            logged_in: false,
            app_running: false,
            launches: 0,
            force_stops: 0,
            scroll_offset: 0,
            window: WindowSize::new(1080, 2340),
            terminate_failures: 0,
            activate_failures: 0,
            execute_failures: 0,
            unresponsive: false,
            screenshot_fails: false,
            call_history: Vec::new(),
            swipe_count: 0,
            next_session: 0,
        }
    }
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mock element
    #[must_use]
    pub fn with_element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Start with a user logged in
    #[must_use]
    pub const fn logged_in(mut self) -> Self {
        self.logged_in = true;
        self
    }

    /// Hand out `id` on the next `open_session`; `valid = false` yields a
    /// handle the remote end does not recognise
    pub fn queue_session(&mut self, id: impl Into<String>, valid: bool) {
        self.planned_sessions.push_back((id.into(), valid));
    }

    /// Simulate the remote end terminating a session
    pub fn kill_session(&mut self, session: &SessionId) {
        let _ = self.live_sessions.remove(session.as_str());
    }

    /// Total swipes performed
    #[must_use]
    pub const fn swipes(&self) -> u32 {
        self.swipe_count
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    /// Count calls starting with `method`
    #[must_use]
    pub fn count_calls(&self, method: &str) -> usize {
        self.call_history
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    fn launch(&mut self) {
        self.app_running = true;
        self.launches += 1;
        self.scroll_offset = 0;
    }

    fn check_session(&self, session: &SessionId) -> HarnessResult<()> {
        if self.live_sessions.contains(session.as_str()) {
            Ok(())
        } else {
            Err(HarnessError::SessionInvalid {
                session_id: session.to_string(),
            })
        }
    }

    fn is_on_screen(&self, element: &MockElement) -> bool {
        let state_ok = match element.visibility {
            Visibility::Always => true,
            Visibility::LoggedIn => self.logged_in,
            Visibility::LoggedOut => !self.logged_in,
        };
        self.app_running && state_ok && self.scroll_offset >= element.scrolls_needed
    }

    fn on_screen(&self, locator: &Locator) -> impl Iterator<Item = &MockElement> + '_ {
        let locator = locator.clone();
        self.elements
            .iter()
            .filter(move |e| e.locator == locator)
            .filter(move |e| self.is_on_screen(e))
    }

    fn element_index(&self, element: &ElementRef) -> HarnessResult<usize> {
        self.elements
            .iter()
            .position(|e| e.id == element.id)
            .ok_or_else(|| HarnessError::Protocol {
                error: "stale element reference".to_string(),
                message: format!("element {} is no longer attached", element.id),
            })
    }

    fn take_failure(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

impl AutomationDriver for MockDriver {
    fn open_session(&mut self, _capabilities: &CapabilityConfig) -> HarnessResult<SessionId> {
        self.call_history.push("open_session".to_string());
        if Self::take_failure(&mut self.open_failures) {
            return Err(HarnessError::transport("connection refused"));
        }

        let (id, valid) = self.planned_sessions.pop_front().unwrap_or_else(|| {
            self.next_session += 1;
            (format!("mock-session-{}", self.next_session), true)
        });
        if valid {
            let _ = self.live_sessions.insert(id.clone());
            self.launch();
        }
        Ok(SessionId::new(id))
    }

    fn is_valid(&mut self, session: &SessionId) -> bool {
        !session.is_blank() && self.live_sessions.contains(session.as_str())
    }

    fn close_session(&mut self, session: &SessionId) -> HarnessResult<()> {
        self.call_history.push(format!("close:{session}"));
        self.check_session(session)?;
        let _ = self.live_sessions.remove(session.as_str());
        Ok(())
    }

    fn find_element(
        &mut self,
        session: &SessionId,
        locator: &Locator,
    ) -> HarnessResult<ElementRef> {
        self.check_session(session)?;
        self.call_history.push(format!("find:{locator}"));
        if self.unresponsive {
            return Err(HarnessError::transport("device not responding"));
        }
        self.on_screen(locator)
            .next()
            .map(|e| ElementRef::new(e.id.clone()))
            .ok_or_else(|| HarnessError::NoSuchElement {
                locator: locator.to_string(),
            })
    }

    fn find_elements(
        &mut self,
        session: &SessionId,
        locator: &Locator,
    ) -> HarnessResult<Vec<ElementRef>> {
        self.check_session(session)?;
        self.call_history.push(format!("find_all:{locator}"));
        if self.unresponsive {
            return Err(HarnessError::transport("device not responding"));
        }
        Ok(self
            .on_screen(locator)
            .map(|e| ElementRef::new(e.id.clone()))
            .collect())
    }

    fn is_clickable(&mut self, session: &SessionId, element: &ElementRef) -> HarnessResult<bool> {
        self.check_session(session)?;
        let idx = self.element_index(element)?;
        let elem = &self.elements[idx];
        Ok(elem.clickable && self.is_on_screen(elem))
    }

    fn click(&mut self, session: &SessionId, element: &ElementRef) -> HarnessResult<()> {
        self.check_session(session)?;
        self.call_history.push(format!("click:{}", element.id));
        let idx = self.element_index(element)?;
        match self.elements[idx].on_click {
            MockAction::None => {}
            MockAction::LogIn => self.logged_in = true,
            MockAction::LogOut => self.logged_in = false,
        }
        Ok(())
    }

    fn send_text(
        &mut self,
        session: &SessionId,
        element: &ElementRef,
        text: &str,
    ) -> HarnessResult<()> {
        self.check_session(session)?;
        self.call_history.push(format!("send_text:{}", element.id));
        let idx = self.element_index(element)?;
        let _ = self.elements[idx]
            .attributes
            .insert("text".to_string(), text.to_string());
        Ok(())
    }

    fn get_attribute(
        &mut self,
        session: &SessionId,
        element: &ElementRef,
        name: &str,
    ) -> HarnessResult<Option<String>> {
        self.check_session(session)?;
        let idx = self.element_index(element)?;
        Ok(self.elements[idx].attributes.get(name).cloned())
    }

    fn screenshot(&mut self, session: &SessionId) -> HarnessResult<Vec<u8>> {
        self.check_session(session)?;
        self.call_history.push("screenshot".to_string());
        if self.screenshot_fails {
            return Err(HarnessError::Protocol {
                error: "unable to capture screen".to_string(),
                message: "screenshot disabled".to_string(),
            });
        }
        Ok(MOCK_PNG.to_vec())
    }

    fn execute(&mut self, session: &SessionId, script: &str, args: Value) -> HarnessResult<Value> {
        self.check_session(session)?;
        self.call_history.push(format!("execute:{script}:{args}"));
        if Self::take_failure(&mut self.execute_failures) {
            return Err(HarnessError::Protocol {
                error: "unknown error".to_string(),
                message: format!("{script} failed"),
            });
        }
        let force_stop = match script {
            "mobile: shell" => {
                args["command"] == "am"
                    && args["args"].get(0).and_then(Value::as_str) == Some("force-stop")
            }
            "mobile: terminateApp" => true,
            _ => false,
        };
        if force_stop {
            self.app_running = false;
            self.force_stops += 1;
        }
        Ok(Value::Null)
    }

    fn terminate_app(&mut self, session: &SessionId, app_id: &str) -> HarnessResult<()> {
        self.check_session(session)?;
        self.call_history.push(format!("terminate:{app_id}"));
        if Self::take_failure(&mut self.terminate_failures) {
            return Err(HarnessError::Protocol {
                error: "unsupported operation".to_string(),
                message: "terminate_app is not supported".to_string(),
            });
        }
        self.app_running = false;
        Ok(())
    }

    fn activate_app(&mut self, session: &SessionId, app_id: &str) -> HarnessResult<()> {
        self.check_session(session)?;
        self.call_history.push(format!("activate:{app_id}"));
        if Self::take_failure(&mut self.activate_failures) {
            return Err(HarnessError::Protocol {
                error: "unknown error".to_string(),
                message: "activate_app failed".to_string(),
            });
        }
        if !self.app_running {
            self.launch();
        }
        Ok(())
    }

    fn window_size(&mut self, session: &SessionId) -> HarnessResult<WindowSize> {
        self.check_session(session)?;
        Ok(self.window)
    }

    fn swipe(&mut self, session: &SessionId, swipe: &Swipe) -> HarnessResult<()> {
        self.check_session(session)?;
        self.call_history.push(format!(
            "swipe:{},{}->{},{}",
            swipe.from.x, swipe.from.y, swipe.to.x, swipe.to.y
        ));
        self.swipe_count += 1;
        self.scroll_offset += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn caps() -> CapabilityConfig {
        CapabilityConfig::android("com.example.app")
    }

    mod session_tests {
        use super::*;

        #[test]
        fn test_generated_sessions_are_live() {
            let mut driver = MockDriver::new();
            let id = driver.open_session(&caps()).unwrap();
            assert_eq!(id.as_str(), "mock-session-1");
            assert!(driver.is_valid(&id));
            assert!(driver.app_running);
            assert_eq!(driver.launches, 1);
        }

        #[test]
        fn test_queued_invalid_session() {
            let mut driver = MockDriver::new();
            driver.queue_session("dead", false);
            let id = driver.open_session(&caps()).unwrap();
            assert_eq!(id.as_str(), "dead");
            assert!(!driver.is_valid(&id));
        }

        #[test]
        fn test_open_failures_count_down() {
            let mut driver = MockDriver::new();
            driver.open_failures = 1;
            assert!(driver.open_session(&caps()).is_err());
            assert!(driver.open_session(&caps()).is_ok());
        }

        #[test]
        fn test_close_dead_session_errors() {
            let mut driver = MockDriver::new();
            let id = driver.open_session(&caps()).unwrap();
            driver.kill_session(&id);
            assert!(driver.close_session(&id).unwrap_err().is_session_error());
            assert!(driver.was_called("close:mock-session-1"));
        }
    }

    mod screen_tests {
        use super::*;

        #[test]
        fn test_login_dependent_visibility() {
            let indicator = Locator::accessibility_id("More");
            let mut driver = MockDriver::new().with_element(
                MockElement::new("more", indicator.clone()).visible_when(Visibility::LoggedIn),
            );
            let id = driver.open_session(&caps()).unwrap();
            assert!(driver.find_elements(&id, &indicator).unwrap().is_empty());

            driver.logged_in = true;
            assert_eq!(driver.find_elements(&id, &indicator).unwrap().len(), 1);
        }

        #[test]
        fn test_click_side_effects() {
            let button = Locator::id("logout");
            let mut driver = MockDriver::new()
                .logged_in()
                .with_element(MockElement::new("l", button.clone()).on_click(MockAction::LogOut));
            let id = driver.open_session(&caps()).unwrap();
            let elem = driver.find_element(&id, &button).unwrap();
            driver.click(&id, &elem).unwrap();
            assert!(!driver.logged_in);
        }

        #[test]
        fn test_terminated_app_shows_nothing() {
            let loc = Locator::id("x");
            let mut driver = MockDriver::new().with_element(MockElement::new("x", loc.clone()));
            let id = driver.open_session(&caps()).unwrap();
            driver.terminate_app(&id, "com.example.app").unwrap();
            assert!(driver.find_element(&id, &loc).unwrap_err().is_no_such_element());

            driver.activate_app(&id, "com.example.app").unwrap();
            assert!(driver.find_element(&id, &loc).is_ok());
            assert_eq!(driver.launches, 2);
        }

        #[test]
        fn test_force_stop_via_shell() {
            let mut driver = MockDriver::new();
            let id = driver.open_session(&caps()).unwrap();
            let (script, args) =
                crate::capabilities::Platform::Android.force_stop_command("com.example.app");
            driver.execute(&id, script, args).unwrap();
            assert!(!driver.app_running);
            assert_eq!(driver.force_stops, 1);
        }

        #[test]
        fn test_send_text_sets_text_attribute() {
            let field = Locator::id("email");
            let mut driver = MockDriver::new().with_element(MockElement::new("e", field.clone()));
            let id = driver.open_session(&caps()).unwrap();
            let elem = driver.find_element(&id, &field).unwrap();
            driver.send_text(&id, &elem, "a@b.c").unwrap();
            assert_eq!(
                driver.get_attribute(&id, &elem, "text").unwrap(),
                Some("a@b.c".to_string())
            );
        }
    }
}
