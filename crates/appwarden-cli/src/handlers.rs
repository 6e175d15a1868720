//! Command handlers
//!
//! Each handler works against any [`AutomationDriver`], so the binary wires
//! in the remote client while the tests drive the in-memory device.

use crate::error::{CliError, CliResult};
use appwarden::{
    AppStateReset, AutomationDriver, FailureCapture, HarnessConfig, Locator, ResetReport,
    ScrollDirection, SessionManager, TestContext, WindowSize,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Values given on the command line, applied after the file and environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Remote automation endpoint
    pub endpoint: Option<String>,
    /// Application identifier
    pub app_id: Option<String>,
    /// Device name
    pub device: Option<String>,
}

/// Build the effective harness configuration.
///
/// Precedence, lowest first: built-in defaults, the YAML file, the
/// `APPWARDEN_*` variables, then command-line flags.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> CliResult<HarnessConfig> {
    resolve_config_with(path, overrides, |key| std::env::var(key).ok())
}

/// [`resolve_config`] with an explicit variable lookup
pub fn resolve_config_with<F>(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
    lookup: F,
) -> CliResult<HarnessConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading harness configuration");
            HarnessConfig::load(path)?
        }
        None => HarnessConfig::default(),
    };

    let mut config = base.with_env_overrides(lookup);
    if let Some(endpoint) = &overrides.endpoint {
        config.endpoint.clone_from(endpoint);
    }
    if let Some(app_id) = &overrides.app_id {
        config.capabilities = config.capabilities.with_app_id(app_id.clone());
    }
    if let Some(device) = &overrides.device {
        config.capabilities = config.capabilities.with_device_name(device.clone());
    }
    Ok(config)
}

/// Outcome of `appwarden check`
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Session that was opened
    pub session_id: String,
    /// Platform name
    pub platform: String,
    /// Application under test
    pub app_id: String,
    /// Device viewport
    pub window: WindowSize,
}

/// Open a session, read the viewport, release the session
pub fn check<D: AutomationDriver>(manager: &mut SessionManager<D>) -> CliResult<CheckReport> {
    let (driver, session) = manager.acquire_with_driver()?;
    let window = driver.window_size(session.id())?;
    let report = CheckReport {
        session_id: session.id().to_string(),
        platform: session.platform().name().to_string(),
        app_id: session.app_id().to_string(),
        window,
    };
    manager.release();
    Ok(report)
}

/// Run one app state reset
pub fn reset<D: AutomationDriver>(
    manager: &mut SessionManager<D>,
    config: &HarnessConfig,
) -> CliResult<ResetReport> {
    Ok(AppStateReset::new(config).run(manager)?)
}

/// Save a screenshot of the current screen under `name`
pub fn screenshot<D: AutomationDriver>(
    manager: &mut SessionManager<D>,
    capture: &FailureCapture,
    name: &str,
) -> CliResult<PathBuf> {
    let (driver, session) = manager.acquire_with_driver()?;
    capture
        .capture(driver, session.id(), name)
        .ok_or_else(|| CliError::command_failed(format!("no screenshot saved for `{name}`")))
}

/// What to look for and how
#[derive(Debug, Clone)]
pub struct FindRequest {
    /// Element to find
    pub locator: Locator,
    /// Lookup budget, the configured one when absent
    pub max_attempts: Option<u32>,
    /// Scroll direction, the configured one when absent
    pub direction: Option<ScrollDirection>,
    /// Tap the element once found
    pub click: bool,
}

/// Outcome of `appwarden find`
#[derive(Debug, Clone, Serialize)]
pub struct FindReport {
    /// Locator searched for
    pub locator: String,
    /// Remote element id
    pub element: String,
    /// Lookups performed
    pub attempts: u32,
    /// Swipes performed
    pub scrolls: u32,
    /// Whether the element was tapped
    pub clicked: bool,
}

/// Scroll search for one element, optionally tapping it
pub fn find<D: AutomationDriver>(
    manager: &mut SessionManager<D>,
    config: &HarnessConfig,
    request: &FindRequest,
) -> CliResult<FindReport> {
    let mut config = config.clone();
    if let Some(direction) = request.direction {
        config.scroll.gesture = config.scroll.gesture.with_direction(direction);
    }
    let budget = request.max_attempts.unwrap_or(config.scroll.max_attempts);
    if budget == 0 {
        return Err(CliError::invalid_argument("max attempts must be at least 1"));
    }

    let (driver, session) = manager.acquire_with_driver()?;
    let mut ctx = TestContext::new(driver, session, &config);
    let found = ctx.find_scrolling_with(&request.locator, budget)?;
    if request.click {
        ctx.click(&request.locator)?;
    }

    Ok(FindReport {
        locator: request.locator.to_string(),
        element: found.element.id,
        attempts: found.attempts,
        scrolls: found.scrolls,
        clicked: request.click,
    })
}
