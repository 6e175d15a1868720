//! Failure screenshots.
//!
//! Artifacts are named `{test_id}_{unix_ts}.png` and written once: a name
//! already on disk gets a `_{n}` suffix instead of being overwritten.
//! Capture problems never mask the test's own failure; they are logged
//! and reported as "no screenshot".

use crate::config::HarnessConfig;
use crate::driver::{AutomationDriver, SessionId};
use crate::result::{HarnessError, HarnessResult};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MAX_SUFFIX: u32 = 1_000;

/// Writes failure screenshots into one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCapture {
    dir: PathBuf,
}

impl FailureCapture {
    /// Capture into `dir`, created on first use
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Capture into the configured screenshot directory
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.screenshot_dir.clone())
    }

    /// Target directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name stem for a test id and timestamp, without extension
    #[must_use]
    pub fn artifact_stem(test_id: &str, timestamp: i64) -> String {
        let safe: String = test_id
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        format!("{safe}_{timestamp}")
    }

    /// Screenshot the current screen for a failed test, stamped now
    pub fn capture<D: AutomationDriver + ?Sized>(
        &self,
        driver: &mut D,
        session: &SessionId,
        test_id: &str,
    ) -> Option<PathBuf> {
        self.capture_at(driver, session, test_id, chrono::Utc::now().timestamp())
    }

    /// Screenshot with an explicit timestamp. Errors are logged, never raised.
    pub fn capture_at<D: AutomationDriver + ?Sized>(
        &self,
        driver: &mut D,
        session: &SessionId,
        test_id: &str,
        timestamp: i64,
    ) -> Option<PathBuf> {
        match self.try_capture(driver, session, test_id, timestamp) {
            Ok(path) => {
                info!(test = test_id, path = %path.display(), "failure screenshot saved");
                Some(path)
            }
            Err(e) => {
                warn!(test = test_id, error = %e, "failure screenshot not captured");
                None
            }
        }
    }

    fn try_capture<D: AutomationDriver + ?Sized>(
        &self,
        driver: &mut D,
        session: &SessionId,
        test_id: &str,
        timestamp: i64,
    ) -> HarnessResult<PathBuf> {
        let png = driver.screenshot(session)?;
        if png.is_empty() {
            return Err(HarnessError::Capture {
                message: "remote end returned an empty screenshot".to_string(),
            });
        }

        fs::create_dir_all(&self.dir)?;
        let stem = Self::artifact_stem(test_id, timestamp);

        for n in 0..MAX_SUFFIX {
            let name = if n == 0 {
                format!("{stem}.png")
            } else {
                format!("{stem}_{n}.png")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    write_or_discard(file, &path, &png)?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(HarnessError::Capture {
            message: format!("too many artifacts named {stem}"),
        })
    }
}

/// Write the whole artifact or leave nothing behind
fn write_or_discard<W: Write>(mut file: W, path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Err(e) = file.write_all(bytes).and_then(|()| file.flush()) {
        drop(file);
        if let Err(rm) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %rm, "partial screenshot not removed");
        }
        return Err(e);
    }
    Ok(())
}
