//! App State Reset
//!
//! Brings the app to a known baseline before every test:
//!
//! ```text
//! logged in? ──yes──► logout flow ──► settle
//!      │                                │
//!      └────────────no──────────────────┤
//!                                       ▼
//!           Restart ──fail──► ForceStop ──fail──► Reacquire ──fail──► ResetExhausted
//!              │ok                │ok                 │ok
//!              ▼                  ▼                   ▼
//!                            ResetReport
//! ```
//!
//! The logged-in check and the logout flow never raise: a lookup error means
//! "not logged in" and an aborted logout is logged and reported. Only an
//! exhausted recovery ladder fails the reset.

use crate::config::{HarnessConfig, LogoutProfile};
use crate::driver::{AutomationDriver, SessionId};
use crate::locator::Locator;
use crate::result::{HarnessError, HarnessResult};
use crate::session::{Session, SessionManager};
use crate::wait::{self, wait_for_clickable};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Whether the logged-in indicator is on screen. Errors count as "no".
pub fn is_logged_in<D: AutomationDriver + ?Sized>(
    driver: &mut D,
    session: &SessionId,
    indicator: &Locator,
) -> bool {
    match driver.find_elements(session, indicator) {
        Ok(found) => !found.is_empty(),
        Err(e) => {
            debug!(%indicator, error = %e, "logged-in check failed, assuming logged out");
            false
        }
    }
}

/// One click of the logout flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutStep {
    /// Open the account menu
    OpenMenu,
    /// Pick the logout entry
    SelectLogout,
    /// Confirm the dialog
    Confirm,
}

impl fmt::Display for LogoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenMenu => "open menu",
            Self::SelectLogout => "select logout",
            Self::Confirm => "confirm",
        })
    }
}

/// Logout flow state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LogoutState {
    /// Nothing clicked yet
    Idle,
    /// Account menu is open
    MenuOpened,
    /// Confirmation dialog is showing
    LogoutConfirmPending,
    /// Logout confirmed
    LoggedOut,
    /// A step failed; the flow stopped there
    Aborted {
        /// Step that failed
        at: LogoutStep,
        /// Why
        reason: String,
    },
}

impl LogoutState {
    /// Step that moves this state forward, `None` for terminal states
    #[must_use]
    pub const fn pending_step(&self) -> Option<LogoutStep> {
        match self {
            Self::Idle => Some(LogoutStep::OpenMenu),
            Self::MenuOpened => Some(LogoutStep::SelectLogout),
            Self::LogoutConfirmPending => Some(LogoutStep::Confirm),
            Self::LoggedOut | Self::Aborted { .. } => None,
        }
    }

    /// State after the pending step succeeded
    #[must_use]
    pub fn advance(self) -> Self {
        match self {
            Self::Idle => Self::MenuOpened,
            Self::MenuOpened => Self::LogoutConfirmPending,
            Self::LogoutConfirmPending => Self::LoggedOut,
            terminal => terminal,
        }
    }

    /// Whether logout completed
    #[must_use]
    pub const fn is_logged_out(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

/// Drive the logout flow to `LoggedOut` or `Aborted`
pub fn run_logout<D: AutomationDriver + ?Sized>(
    driver: &mut D,
    session: &SessionId,
    profile: &LogoutProfile,
    config: &HarnessConfig,
) -> LogoutState {
    let mut state = LogoutState::Idle;

    while let Some(step) = state.pending_step() {
        match logout_step(driver, session, profile, config, step) {
            Ok(()) => {
                debug!(%step, "logout step done");
                state = state.advance();
            }
            Err(e) => {
                warn!(%step, error = %e, "logout aborted");
                return LogoutState::Aborted {
                    at: step,
                    reason: e.to_string(),
                };
            }
        }
    }
    state
}

fn logout_step<D: AutomationDriver + ?Sized>(
    driver: &mut D,
    session: &SessionId,
    profile: &LogoutProfile,
    config: &HarnessConfig,
    step: LogoutStep,
) -> HarnessResult<()> {
    let locator = match step {
        LogoutStep::OpenMenu => &profile.menu,
        LogoutStep::SelectLogout => &profile.entry,
        LogoutStep::Confirm => &profile.confirm,
    };
    if step == LogoutStep::SelectLogout && profile.entry_needs_scroll {
        let _ = config.resilient_locator().find(
            driver,
            session,
            locator,
            config.scroll.max_attempts,
        )?;
    }
    let element = wait_for_clickable(driver, session, locator, &config.wait_options())?;
    driver.click(session, &element)
}

/// Ways to bring the app back to a fresh launch, cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Terminate and reactivate through the driver
    Restart,
    /// Platform force-stop command, then reactivate
    ForceStop,
    /// Throw the session away and open a new one
    Reacquire,
}

impl RecoveryStrategy {
    /// Full ladder in evaluation order
    pub const LADDER: [Self; 3] = [Self::Restart, Self::ForceStop, Self::Reacquire];
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Restart => "restart",
            Self::ForceStop => "force-stop",
            Self::Reacquire => "reacquire",
        })
    }
}

/// A rung that did not work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RungFailure {
    /// Rung
    pub strategy: RecoveryStrategy,
    /// Error it raised
    pub reason: String,
}

impl fmt::Display for RungFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

/// What a successful reset did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// Indicator was present before the reset
    pub was_logged_in: bool,
    /// Final logout state, if logout was attempted
    pub logout: Option<LogoutState>,
    /// Rung that restored the app
    pub recovered_by: RecoveryStrategy,
    /// Rungs that failed before it
    pub failures: Vec<RungFailure>,
}

/// Try each strategy in order until one succeeds.
///
/// Returns the winning strategy with the failures before it, or every
/// failure when none succeeded. No rung is ever skipped.
pub fn evaluate_ladder<F>(
    ladder: &[RecoveryStrategy],
    mut attempt: F,
) -> Result<(RecoveryStrategy, Vec<RungFailure>), Vec<RungFailure>>
where
    F: FnMut(RecoveryStrategy) -> HarnessResult<()>,
{
    let mut failures = Vec::new();
    for &strategy in ladder {
        match attempt(strategy) {
            Ok(()) => return Ok((strategy, failures)),
            Err(e) => {
                warn!(%strategy, error = %e, "recovery rung failed");
                failures.push(RungFailure {
                    strategy,
                    reason: e.to_string(),
                });
            }
        }
    }
    Err(failures)
}

/// Per-test app state reset
#[derive(Debug, Clone, Copy)]
pub struct AppStateReset<'a> {
    config: &'a HarnessConfig,
}

impl<'a> AppStateReset<'a> {
    /// Create a reset bound to the configuration
    #[must_use]
    pub const fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    /// Log out if needed, then restart the app through the ladder.
    ///
    /// Fails only when no session can be acquired or every rung failed; in
    /// the latter case the scope's session slot is left empty.
    pub fn run<D: AutomationDriver>(
        &self,
        manager: &mut SessionManager<D>,
    ) -> HarnessResult<ResetReport> {
        let (driver, session) = manager.acquire_with_driver()?;
        let (was_logged_in, logout) = self.log_out_if_needed(driver, session.id());

        match evaluate_ladder(&RecoveryStrategy::LADDER, |rung| self.apply(rung, manager)) {
            Ok((recovered_by, failures)) => {
                info!(%recovered_by, was_logged_in, "app state reset");
                Ok(ResetReport {
                    was_logged_in,
                    logout,
                    recovered_by,
                    failures,
                })
            }
            Err(failures) => {
                manager.release();
                Err(HarnessError::ResetExhausted {
                    failures: failures.iter().map(ToString::to_string).collect(),
                })
            }
        }
    }

    /// Best-effort logout after a test; never fails
    pub fn teardown<D: AutomationDriver + ?Sized>(
        &self,
        driver: &mut D,
        session: &Session,
    ) -> Option<LogoutState> {
        let (_, logout) = self.log_out_if_needed(driver, session.id());
        logout
    }

    fn log_out_if_needed<D: AutomationDriver + ?Sized>(
        &self,
        driver: &mut D,
        session: &SessionId,
    ) -> (bool, Option<LogoutState>) {
        let logged_in = self
            .config
            .app
            .logged_in_indicator
            .as_ref()
            .is_some_and(|indicator| is_logged_in(driver, session, indicator));
        if !logged_in {
            return (false, None);
        }

        info!("user still logged in, logging out");
        let state = match &self.config.app.logout {
            Some(profile) => run_logout(driver, session, profile, self.config),
            None => {
                warn!("logged in but no logout controls configured");
                LogoutState::Aborted {
                    at: LogoutStep::OpenMenu,
                    reason: "no logout controls configured".to_string(),
                }
            }
        };
        wait::settle(self.config.settle.after_logout());
        (true, Some(state))
    }

    fn apply<D: AutomationDriver>(
        &self,
        strategy: RecoveryStrategy,
        manager: &mut SessionManager<D>,
    ) -> HarnessResult<()> {
        match strategy {
            RecoveryStrategy::Restart => {
                let (driver, session) = live_parts(manager)?;
                self.restart(driver, session)
            }
            RecoveryStrategy::ForceStop => {
                let (driver, session) = live_parts(manager)?;
                self.force_stop(driver, session)
            }
            RecoveryStrategy::Reacquire => manager.reacquire().map(|_| ()),
        }
    }

    fn restart<D: AutomationDriver + ?Sized>(
        &self,
        driver: &mut D,
        session: &Session,
    ) -> HarnessResult<()> {
        let settle = &self.config.settle;
        let terminated = driver.terminate_app(session.id(), session.app_id());
        wait::settle(settle.after_terminate());
        let activated = driver.activate_app(session.id(), session.app_id());
        wait::settle(settle.after_activate());

        match (terminated, activated) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(e), Err(also)) => {
                debug!(error = %also, "activate failed after terminate failed");
                Err(e)
            }
        }
    }

    fn force_stop<D: AutomationDriver + ?Sized>(
        &self,
        driver: &mut D,
        session: &Session,
    ) -> HarnessResult<()> {
        let settle = &self.config.settle;
        let (script, args) = session.platform().force_stop_command(session.app_id());
        let _ = driver.execute(session.id(), script, args)?;
        wait::settle(settle.after_terminate());
        driver.activate_app(session.id(), session.app_id())?;
        wait::settle(settle.after_activate());
        Ok(())
    }
}

fn live_parts<D: AutomationDriver>(
    manager: &mut SessionManager<D>,
) -> HarnessResult<(&mut D, &Session)> {
    manager.parts_mut().ok_or_else(|| HarnessError::SessionUnavailable {
        attempts: 0,
        message: "no session to recover".to_string(),
    })
}
