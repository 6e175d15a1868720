//! Session lifecycle.
//!
//! A [`SessionManager`] owns the driver and at most one [`Session`] for the
//! current scope. Tests borrow the session; the manager alone opens,
//! replaces and closes it. Release is guaranteed through `Drop`.

use crate::capabilities::{CapabilityConfig, Platform};
use crate::config::HarnessConfig;
use crate::driver::{AutomationDriver, SessionId};
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Openings tried before a scope gives up
pub const ACQUIRE_ATTEMPTS: u32 = 2;

/// How long a session lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionScope {
    /// One session for the whole run
    #[default]
    Run,
    /// A fresh session per suite
    Group,
}

/// An open session with the remote automation backend
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    endpoint: String,
    capabilities: Arc<CapabilityConfig>,
    valid: bool,
}

impl Session {
    /// Remote session id
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Endpoint the session lives on
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Capabilities the session was opened with
    #[must_use]
    pub fn capabilities(&self) -> &CapabilityConfig {
        &self.capabilities
    }

    /// Target platform
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.capabilities.platform()
    }

    /// Application under test
    #[must_use]
    pub fn app_id(&self) -> &str {
        self.capabilities.app_id()
    }

    /// False once the harness has seen the session die
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Owns the driver and the scope's session
#[derive(Debug)]
pub struct SessionManager<D: AutomationDriver> {
    driver: D,
    endpoint: String,
    capabilities: Arc<CapabilityConfig>,
    session: Option<Session>,
    poisoned: Option<String>,
    scope_started: bool,
}

impl<D: AutomationDriver> SessionManager<D> {
    /// Create a manager; no session is opened until [`Self::acquire`]
    pub fn new(driver: D, endpoint: impl Into<String>, capabilities: CapabilityConfig) -> Self {
        Self {
            driver,
            endpoint: endpoint.into(),
            capabilities: Arc::new(capabilities),
            session: None,
            poisoned: None,
            scope_started: false,
        }
    }

    /// Create a manager from the harness configuration
    pub fn from_config(driver: D, config: &HarnessConfig) -> Self {
        Self::new(driver, config.endpoint.clone(), config.capabilities.clone())
    }

    /// Return the scope's session, opening one if there is none.
    ///
    /// A handle the remote end does not acknowledge is closed and the
    /// opening retried once. If the first acquisition of a scope fails, the
    /// scope is poisoned and later calls fail without contacting the
    /// endpoint.
    pub fn acquire(&mut self) -> HarnessResult<&Session> {
        if let Some(reason) = &self.poisoned {
            return Err(HarnessError::SessionUnavailable {
                attempts: 0,
                message: format!("scope poisoned: {reason}"),
            });
        }

        if !self.session.as_ref().is_some_and(Session::is_valid) {
            self.release();
            match self.open_with_retry() {
                Ok(session) => {
                    info!(session = %session.id, endpoint = %self.endpoint, "session acquired");
                    self.session = Some(session);
                    self.scope_started = true;
                }
                Err(e) => {
                    if !self.scope_started {
                        warn!(error = %e, "initial session acquisition failed, poisoning scope");
                        self.poisoned = Some(e.to_string());
                    }
                    return Err(e);
                }
            }
        }

        self.session
            .as_ref()
            .ok_or_else(|| HarnessError::SessionUnavailable {
                attempts: 0,
                message: "no session in scope".to_string(),
            })
    }

    /// Acquire and hand out the driver together with the session
    pub fn acquire_with_driver(&mut self) -> HarnessResult<(&mut D, &Session)> {
        let _ = self.acquire()?;
        self.parts_mut().ok_or_else(|| HarnessError::SessionUnavailable {
            attempts: 0,
            message: "no session in scope".to_string(),
        })
    }

    fn open_with_retry(&mut self) -> HarnessResult<Session> {
        let mut last_error = String::new();

        for attempt in 1..=ACQUIRE_ATTEMPTS {
            match self.driver.open_session(&self.capabilities) {
                Ok(id) if !id.is_blank() && self.driver.is_valid(&id) => {
                    return Ok(Session {
                        id,
                        endpoint: self.endpoint.clone(),
                        capabilities: Arc::clone(&self.capabilities),
                        valid: true,
                    });
                }
                Ok(id) => {
                    warn!(attempt, session = %id, "remote end returned an unusable session");
                    if !id.is_blank() {
                        if let Err(e) = self.driver.close_session(&id) {
                            debug!(session = %id, error = %e, "closing broken handle failed");
                        }
                    }
                    last_error = format!("session `{id}` was not acknowledged");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "opening session failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(HarnessError::SessionUnavailable {
            attempts: ACQUIRE_ATTEMPTS,
            message: last_error,
        })
    }

    /// Close the current session, if any. Never fails; safe to repeat.
    pub fn release(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if !self.driver.is_valid(&session.id) {
            info!(session = %session.id, "session already terminated, nothing to close");
            return;
        }
        match self.driver.close_session(&session.id) {
            Ok(()) => info!(session = %session.id, "session released"),
            Err(e) => warn!(session = %session.id, error = %e, "closing session failed"),
        }
    }

    /// Discard the current session and open a fresh one
    pub fn reacquire(&mut self) -> HarnessResult<&Session> {
        self.release();
        self.acquire()
    }

    /// Mark the current session dead; the next [`Self::acquire`] replaces it
    pub fn invalidate(&mut self) {
        if let Some(session) = self.session.as_mut() {
            debug!(session = %session.id, "session invalidated");
            session.valid = false;
        }
    }

    /// Release the session and start a new scope
    pub fn end_scope(&mut self) {
        self.release();
        self.poisoned = None;
        self.scope_started = false;
    }

    /// Current session without opening one
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Driver and session, if a session is open
    pub fn parts_mut(&mut self) -> Option<(&mut D, &Session)> {
        match &self.session {
            Some(session) => Some((&mut self.driver, session)),
            None => None,
        }
    }

    /// Why the scope was poisoned, if it was
    #[must_use]
    pub fn poison_reason(&self) -> Option<&str> {
        self.poisoned.as_deref()
    }

    /// Whether the scope is poisoned
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Underlying driver, mutably
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Shared capabilities
    #[must_use]
    pub fn capabilities(&self) -> &CapabilityConfig {
        &self.capabilities
    }
}

impl<D: AutomationDriver> Drop for SessionManager<D> {
    fn drop(&mut self) {
        self.release();
    }
}
