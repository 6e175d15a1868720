//! Harness configuration
//!
//! One immutable value, built once (from YAML, code, or both) and passed
//! by reference into the session manager, app state reset and test
//! runner. Nothing in the harness reads ambient global state; environment
//! overrides are applied explicitly when the value is built.

use crate::capabilities::CapabilityConfig;
use crate::locator::{Locator, ResilientLocator, ScrollGesture, DEFAULT_MAX_ATTEMPTS};
use crate::result::{HarnessError, HarnessResult};
use crate::session::SessionScope;
use crate::wait::{WaitOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Appium endpoint
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:4723";

/// Default screenshot directory, relative to the working directory
pub const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";

/// Environment variable overriding the endpoint
pub const ENV_ENDPOINT: &str = "APPWARDEN_ENDPOINT";
/// Environment variable overriding the application identifier
pub const ENV_APP_ID: &str = "APPWARDEN_APP_ID";
/// Environment variable overriding the device name
pub const ENV_DEVICE: &str = "APPWARDEN_DEVICE";
/// Environment variable overriding the device udid
pub const ENV_UDID: &str = "APPWARDEN_UDID";

/// Bounded-wait and transport timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Wait-for-clickable/present timeout
    pub wait_ms: u64,
    /// Poll interval of bounded waits
    pub poll_ms: u64,
    /// Per-request timeout of the remote client
    pub command_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            wait_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_ms: DEFAULT_POLL_INTERVAL_MS,
            command_ms: 60_000,
        }
    }
}

impl Timeouts {
    /// Wait options for bounded waits
    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout_ms: self.wait_ms,
            poll_interval_ms: self.poll_ms,
        }
    }

    /// Per-request timeout
    #[must_use]
    pub const fn command(&self) -> Duration {
        Duration::from_millis(self.command_ms)
    }
}

/// Fixed waits after state-changing actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    /// After the logout flow completes
    pub after_logout_ms: u64,
    /// After terminating or force-stopping the app
    pub after_terminate_ms: u64,
    /// After (re)activating the app
    pub after_activate_ms: u64,
    /// After each scroll gesture
    pub after_scroll_ms: u64,
    /// After clicking a control
    pub after_click_ms: u64,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            after_logout_ms: 2_000,
            after_terminate_ms: 1_000,
            after_activate_ms: 1_000,
            after_scroll_ms: 1_000,
            after_click_ms: 1_000,
        }
    }
}

impl SettleDelays {
    /// No settling at all
    #[must_use]
    pub const fn none() -> Self {
        Self {
            after_logout_ms: 0,
            after_terminate_ms: 0,
            after_activate_ms: 0,
            after_scroll_ms: 0,
            after_click_ms: 0,
        }
    }

    /// After logout
    #[must_use]
    pub const fn after_logout(&self) -> Duration {
        Duration::from_millis(self.after_logout_ms)
    }

    /// After terminate / force-stop
    #[must_use]
    pub const fn after_terminate(&self) -> Duration {
        Duration::from_millis(self.after_terminate_ms)
    }

    /// After activate
    #[must_use]
    pub const fn after_activate(&self) -> Duration {
        Duration::from_millis(self.after_activate_ms)
    }

    /// After a scroll gesture
    #[must_use]
    pub const fn after_scroll(&self) -> Duration {
        Duration::from_millis(self.after_scroll_ms)
    }

    /// After a click
    #[must_use]
    pub const fn after_click(&self) -> Duration {
        Duration::from_millis(self.after_click_ms)
    }
}

/// Scroll search settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Swipe geometry
    #[serde(flatten)]
    pub gesture: ScrollGesture,
    /// Lookup budget
    pub max_attempts: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            gesture: ScrollGesture::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Controls of the logout flow, in click order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutProfile {
    /// Opens the account menu
    pub menu: Locator,
    /// Menu entry that starts logout
    pub entry: Locator,
    /// The entry may be below the fold and needs a scroll search
    #[serde(default)]
    pub entry_needs_scroll: bool,
    /// Confirms logout
    pub confirm: Locator,
}

/// App-specific knowledge the reset needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppProfile {
    /// Element only present while a user is logged in
    pub logged_in_indicator: Option<Locator>,
    /// How to log out
    pub logout: Option<LogoutProfile>,
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Remote automation endpoint (`http://host:port[/base]`)
    pub endpoint: String,
    /// Session capabilities
    pub capabilities: CapabilityConfig,
    /// How long one session lives
    pub scope: SessionScope,
    /// Waits and transport timeouts
    pub timeouts: Timeouts,
    /// Settle delays
    pub settle: SettleDelays,
    /// Scroll search
    pub scroll: ScrollConfig,
    /// Where failure screenshots go
    pub screenshot_dir: PathBuf,
    /// Login indicator and logout controls
    pub app: AppProfile,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            capabilities: CapabilityConfig::default(),
            scope: SessionScope::default(),
            timeouts: Timeouts::default(),
            settle: SettleDelays::default(),
            scroll: ScrollConfig::default(),
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
            app: AppProfile::default(),
        }
    }
}

impl HarnessConfig {
    /// Config for the given capabilities, defaults elsewhere
    #[must_use]
    pub fn new(capabilities: CapabilityConfig) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    /// Set endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set session scope
    #[must_use]
    pub const fn with_scope(mut self, scope: SessionScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set timeouts
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set settle delays
    #[must_use]
    pub const fn with_settle(mut self, settle: SettleDelays) -> Self {
        self.settle = settle;
        self
    }

    /// Set scroll search settings
    #[must_use]
    pub const fn with_scroll(mut self, scroll: ScrollConfig) -> Self {
        self.scroll = scroll;
        self
    }

    /// Set screenshot directory
    #[must_use]
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    /// Set app profile
    #[must_use]
    pub fn with_app(mut self, app: AppProfile) -> Self {
        self.app = app;
        self
    }

    /// Parse YAML
    pub fn from_yaml_str(yaml: &str) -> HarnessResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a YAML file
    pub fn load(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> HarnessResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Apply overrides from a variable lookup (endpoint, app id, device, udid)
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(endpoint) = non_empty(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(app_id) = non_empty(ENV_APP_ID) {
            self.capabilities = self.capabilities.with_app_id(app_id);
        }
        if let Some(device) = non_empty(ENV_DEVICE) {
            self.capabilities = self.capabilities.with_device_name(device);
        }
        if let Some(udid) = non_empty(ENV_UDID) {
            self.capabilities = self.capabilities.with_udid(udid);
        }
        self
    }

    /// Apply overrides from the process environment
    #[must_use]
    pub fn with_process_env(self) -> Self {
        self.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> HarnessResult<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(HarnessError::config("endpoint is empty"));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(HarnessError::config(format!(
                "endpoint `{endpoint}` must start with http:// or https://"
            )));
        }
        self.capabilities.validate()?;
        self.scroll.gesture.validate()?;
        if self.scroll.max_attempts == 0 {
            return Err(HarnessError::config("scroll.max_attempts must be at least 1"));
        }
        if self.timeouts.poll_ms == 0 {
            return Err(HarnessError::config("timeouts.poll_ms must be positive"));
        }
        Ok(())
    }

    /// Wait options for bounded waits
    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        self.timeouts.wait_options()
    }

    /// Scroll finder using the configured gesture and settle delay
    #[must_use]
    pub const fn resilient_locator(&self) -> ResilientLocator {
        ResilientLocator::new(self.scroll.gesture, self.settle.after_scroll())
    }
}
