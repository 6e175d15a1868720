//! Result and error types for Appwarden.
//!
//! Variants follow the harness error taxonomy: session errors, element
//! lookup errors, state-reset errors, assertion failures and cleanup
//! errors. Callers match on the variant instead of parsing log output.

use thiserror::Error;

/// Result type for Appwarden operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur in Appwarden
#[derive(Debug, Error)]
pub enum HarnessError {
    /// No working session could be opened for the scope
    #[error("Session unavailable after {attempts} attempt(s): {message}")]
    SessionUnavailable {
        /// Number of acquisition attempts made
        attempts: u32,
        /// Last failure reason
        message: String,
    },

    /// The remote end no longer recognises the session
    #[error("Session {session_id} is invalid or terminated")]
    SessionInvalid {
        /// Session identifier
        session_id: String,
    },

    /// Single lookup found nothing (driver-level, recoverable by scrolling)
    #[error("No such element: {locator}")]
    NoSuchElement {
        /// Locator that matched nothing
        locator: String,
    },

    /// Scroll search exhausted its attempt budget
    #[error("Element {locator} not found after {attempts} attempt(s)")]
    ElementNotFound {
        /// Locator that was searched for
        locator: String,
        /// Lookups performed
        attempts: u32,
    },

    /// A bounded wait elapsed without its condition becoming true
    #[error("Timed out after {ms}ms waiting for {condition}")]
    WaitTimeout {
        /// Condition description
        condition: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Every rung of the recovery ladder failed
    #[error("App state reset exhausted: {}", failures.join("; "))]
    ResetExhausted {
        /// One entry per failed rung, in ladder order
        failures: Vec<String>,
    },

    /// The behaviour under test did not hold
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// The automation endpoint answered with a W3C error
    #[error("Remote error `{error}`: {message}")]
    Protocol {
        /// W3C error code (e.g. `stale element reference`)
        error: String,
        /// Error message
        message: String,
    },

    /// The automation endpoint could not be reached
    #[error("Transport error: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// Screenshot capture failed
    #[error("Screenshot capture failed: {message}")]
    Capture {
        /// Error message
        message: String,
    },

    /// Configuration is missing or malformed
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl HarnessError {
    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Errors meaning the session itself is gone or never came up
    #[must_use]
    pub const fn is_session_error(&self) -> bool {
        matches!(
            self,
            Self::SessionInvalid { .. } | Self::SessionUnavailable { .. }
        )
    }

    /// Single-lookup absence, the only error a scroll search retries on
    #[must_use]
    pub const fn is_no_such_element(&self) -> bool {
        matches!(self, Self::NoSuchElement { .. })
    }

    /// Exhausted scroll search
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. })
    }

    /// Failure of the behaviour under test (never retried or swallowed)
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        matches!(self, Self::AssertionFailed { .. })
    }
}
