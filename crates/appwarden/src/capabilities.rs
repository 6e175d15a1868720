//! Capability Configuration
//!
//! The named settings used to request a device/platform/application
//! session. Built once, then shared read-only by every component that
//! needs it (session opening, app restart, force-stop).

use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Capability keys defined by W3C WebDriver; everything else is vendor-prefixed
const W3C_KEYS: &[&str] = &[
    "browserName",
    "browserVersion",
    "platformName",
    "acceptInsecureCerts",
    "pageLoadStrategy",
    "proxy",
    "setWindowRect",
    "timeouts",
    "strictFileInteractability",
    "unhandledPromptBehavior",
    "webSocketUrl",
];

/// Vendor prefix for Appium capabilities
const APPIUM_PREFIX: &str = "appium:";

/// Mobile platform of the application under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Platform {
    /// Android (UiAutomator2)
    #[default]
    #[serde(rename = "android", alias = "Android")]
    Android,
    /// iOS (XCUITest)
    #[serde(rename = "ios", alias = "iOS", alias = "IOS")]
    Ios,
}

impl Platform {
    /// Value of the `platformName` capability
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Android => "Android",
            Self::Ios => "iOS",
        }
    }

    /// Automation engine used when none is configured
    #[must_use]
    pub const fn default_automation(self) -> &'static str {
        match self {
            Self::Android => "UiAutomator2",
            Self::Ios => "XCUITest",
        }
    }

    /// Capability key carrying the application identifier
    #[must_use]
    pub const fn app_id_key(self) -> &'static str {
        match self {
            Self::Android => "appPackage",
            Self::Ios => "bundleId",
        }
    }

    /// Argument key the Appium app-management endpoints expect
    #[must_use]
    pub const fn app_management_key(self) -> &'static str {
        match self {
            Self::Android => "appId",
            Self::Ios => "bundleId",
        }
    }

    /// Force-stop command for the remote `execute` endpoint.
    ///
    /// Android goes through the device shell (`am force-stop`); iOS has no
    /// shell, so the XCUITest `terminateApp` extension is used instead.
    #[must_use]
    pub fn force_stop_command(self, app_id: &str) -> (&'static str, Value) {
        match self {
            Self::Android => (
                "mobile: shell",
                json!({ "command": "am", "args": ["force-stop", app_id] }),
            ),
            Self::Ios => ("mobile: terminateApp", json!({ "bundleId": app_id })),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable capability configuration passed at session creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    platform: Platform,
    platform_version: Option<String>,
    device_name: Option<String>,
    udid: Option<String>,
    app_id: String,
    app_activity: Option<String>,
    automation_name: Option<String>,
    no_reset: bool,
    new_command_timeout_secs: Option<u64>,
    extra: BTreeMap<String, Value>,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Android,
            platform_version: None,
            device_name: None,
            udid: None,
            app_id: String::new(),
            app_activity: None,
            automation_name: None,
            no_reset: true,
            new_command_timeout_secs: None,
            extra: BTreeMap::new(),
        }
    }
}

impl CapabilityConfig {
    /// Android application identified by its package name
    #[must_use]
    pub fn android(package: impl Into<String>) -> Self {
        Self {
            platform: Platform::Android,
            app_id: package.into(),
            ..Self::default()
        }
    }

    /// iOS application identified by its bundle id
    #[must_use]
    pub fn ios(bundle_id: impl Into<String>) -> Self {
        Self {
            platform: Platform::Ios,
            app_id: bundle_id.into(),
            ..Self::default()
        }
    }

    /// Set platform version
    #[must_use]
    pub fn with_platform_version(mut self, version: impl Into<String>) -> Self {
        self.platform_version = Some(version.into());
        self
    }

    /// Set device name
    #[must_use]
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Set device udid
    #[must_use]
    pub fn with_udid(mut self, udid: impl Into<String>) -> Self {
        self.udid = Some(udid.into());
        self
    }

    /// Replace the application identifier
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Set the Android launch activity
    #[must_use]
    pub fn with_app_activity(mut self, activity: impl Into<String>) -> Self {
        self.app_activity = Some(activity.into());
        self
    }

    /// Override the automation engine
    #[must_use]
    pub fn with_automation_name(mut self, name: impl Into<String>) -> Self {
        self.automation_name = Some(name.into());
        self
    }

    /// Keep (true) or wipe (false) app state between sessions
    #[must_use]
    pub const fn with_no_reset(mut self, no_reset: bool) -> Self {
        self.no_reset = no_reset;
        self
    }

    /// Seconds the server waits for a command before ending the session
    #[must_use]
    pub const fn with_new_command_timeout(mut self, secs: u64) -> Self {
        self.new_command_timeout_secs = Some(secs);
        self
    }

    /// Add an arbitrary capability
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.extra.insert(key.into(), value.into());
        self
    }

    /// Platform
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Application identifier (package or bundle id)
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Device name, if configured
    #[must_use]
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Device udid, if configured
    #[must_use]
    pub fn udid(&self) -> Option<&str> {
        self.udid.as_deref()
    }

    /// Platform version, if configured
    #[must_use]
    pub fn platform_version(&self) -> Option<&str> {
        self.platform_version.as_deref()
    }

    /// Effective automation engine name
    #[must_use]
    pub fn automation_name(&self) -> &str {
        self.automation_name
            .as_deref()
            .unwrap_or_else(|| self.platform.default_automation())
    }

    /// Whether app state is kept between sessions
    #[must_use]
    pub const fn no_reset(&self) -> bool {
        self.no_reset
    }

    /// Check required fields
    pub fn validate(&self) -> HarnessResult<()> {
        if self.app_id.trim().is_empty() {
            return Err(HarnessError::config("application identifier is empty"));
        }
        if self.extra.contains_key("platformName") {
            return Err(HarnessError::config(
                "platformName is derived from `platform`, remove it from extra capabilities",
            ));
        }
        Ok(())
    }

    /// Flat capability map with W3C keys bare and the rest `appium:`-prefixed
    #[must_use]
    pub fn to_capability_map(&self) -> Map<String, Value> {
        let mut caps = Map::new();
        let _ = caps.insert("platformName".into(), json!(self.platform.name()));

        let mut vendor = |key: &str, value: Value| {
            let _ = caps.insert(prefixed(key), value);
        };
        vendor("automationName", json!(self.automation_name()));
        vendor(self.platform.app_id_key(), json!(self.app_id));
        vendor("noReset", json!(self.no_reset));
        if let Some(version) = &self.platform_version {
            vendor("platformVersion", json!(version));
        }
        if let Some(device) = &self.device_name {
            vendor("deviceName", json!(device));
        }
        if let Some(udid) = &self.udid {
            vendor("udid", json!(udid));
        }
        if let (Platform::Android, Some(activity)) = (self.platform, &self.app_activity) {
            vendor("appActivity", json!(activity));
        }
        if let Some(secs) = self.new_command_timeout_secs {
            vendor("newCommandTimeout", json!(secs));
        }
        for (key, value) in &self.extra {
            vendor(key, value.clone());
        }
        caps
    }

    /// Body of the W3C `POST /session` request
    #[must_use]
    pub fn to_w3c_payload(&self) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": Value::Object(self.to_capability_map()),
                "firstMatch": [{}],
            }
        })
    }
}

fn prefixed(key: &str) -> String {
    if key.contains(':') || W3C_KEYS.contains(&key) {
        key.to_string()
    } else {
        format!("{APPIUM_PREFIX}{key}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod platform_tests {
        use super::*;

        #[test]
        fn test_platform_names() {
            assert_eq!(Platform::Android.name(), "Android");
            assert_eq!(Platform::Ios.name(), "iOS");
            assert_eq!(Platform::Ios.to_string(), "iOS");
        }

        #[test]
        fn test_android_force_stop_uses_shell() {
            let (script, args) = Platform::Android.force_stop_command("com.example.app");
            assert_eq!(script, "mobile: shell");
            assert_eq!(args["command"], "am");
            assert_eq!(args["args"], json!(["force-stop", "com.example.app"]));
        }

        #[test]
        fn test_ios_force_stop_uses_terminate_extension() {
            let (script, args) = Platform::Ios.force_stop_command("com.example.app");
            assert_eq!(script, "mobile: terminateApp");
            assert_eq!(args["bundleId"], "com.example.app");
        }

        #[test]
        fn test_platform_deserializes_aliases() {
            let p: Platform = serde_yaml_ng::from_str("iOS").unwrap();
            assert_eq!(p, Platform::Ios);
            let p: Platform = serde_yaml_ng::from_str("android").unwrap();
            assert_eq!(p, Platform::Android);
        }
    }

    mod payload_tests {
        use super::*;

        #[test]
        fn test_android_payload() {
            let caps = CapabilityConfig::android("com.example.app")
                .with_platform_version("14")
                .with_device_name("Galaxy S24 Ultra")
                .with_app_activity("com.example.SplashActivity");
            let payload = caps.to_w3c_payload();
            let always = &payload["capabilities"]["alwaysMatch"];

            assert_eq!(always["platformName"], "Android");
            assert_eq!(always["appium:automationName"], "UiAutomator2");
            assert_eq!(always["appium:appPackage"], "com.example.app");
            assert_eq!(always["appium:appActivity"], "com.example.SplashActivity");
            assert_eq!(always["appium:deviceName"], "Galaxy S24 Ultra");
            assert_eq!(always["appium:noReset"], true);
            assert_eq!(payload["capabilities"]["firstMatch"], json!([{}]));
        }

        #[test]
        fn test_ios_payload_uses_bundle_id_and_skips_activity() {
            let caps = CapabilityConfig::ios("com.example.app")
                .with_app_activity("ignored")
                .with_udid("00008140-0001")
                .with_new_command_timeout(3600);
            let map = caps.to_capability_map();

            assert_eq!(map["platformName"], "iOS");
            assert_eq!(map["appium:automationName"], "XCUITest");
            assert_eq!(map["appium:bundleId"], "com.example.app");
            assert_eq!(map["appium:udid"], "00008140-0001");
            assert_eq!(map["appium:newCommandTimeout"], 3600);
            assert!(!map.contains_key("appium:appActivity"));
        }

        #[test]
        fn test_extra_keys_prefixing() {
            let caps = CapabilityConfig::android("pkg")
                .with_extra("fullContextList", true)
                .with_extra("acceptInsecureCerts", true)
                .with_extra("custom:flag", "x");
            let map = caps.to_capability_map();

            assert_eq!(map["appium:fullContextList"], true);
            assert_eq!(map["acceptInsecureCerts"], true);
            assert_eq!(map["custom:flag"], "x");
        }

        #[test]
        fn test_automation_override() {
            let caps = CapabilityConfig::android("pkg").with_automation_name("Espresso");
            assert_eq!(caps.automation_name(), "Espresso");
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_empty_app_id_rejected() {
            let err = CapabilityConfig::default().validate().unwrap_err();
            assert!(err.to_string().contains("application identifier"));
        }

        #[test]
        fn test_platform_name_in_extra_rejected() {
            let caps = CapabilityConfig::android("pkg").with_extra("platformName", "iOS");
            assert!(caps.validate().is_err());
        }

        #[test]
        fn test_valid_config() {
            assert!(CapabilityConfig::ios("com.example").validate().is_ok());
        }

        #[test]
        fn test_deserialize_from_yaml() {
            let yaml = r"
platform: ios
platform_version: '18.4'
device_name: iPhone 16 Plus
app_id: com.example.app
extra:
  connectHardwareKeyboard: true
";
            let caps: CapabilityConfig = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(caps.platform(), Platform::Ios);
            assert_eq!(caps.platform_version(), Some("18.4"));
            assert_eq!(caps.device_name(), Some("iPhone 16 Plus"));
            assert!(caps.no_reset());
            assert_eq!(
                caps.to_capability_map()["appium:connectHardwareKeyboard"],
                true
            );
        }
    }
}
