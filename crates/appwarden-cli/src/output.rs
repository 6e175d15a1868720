//! Output formatting and progress reporting

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Status lines and a spinner for long remote calls, all on stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Show a spinner while a slow step runs
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    /// Remove the spinner, if any
    pub fn finish(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a success line
    pub fn success(&mut self, message: &str) {
        self.finish();
        if !self.quiet {
            self.line(Mark::Ok, message);
        }
    }

    /// Print a failure line, even in quiet mode
    pub fn failure(&mut self, message: &str) {
        self.finish();
        self.line(Mark::Fail, message);
    }

    /// Print a warning line
    pub fn warning(&mut self, message: &str) {
        self.finish();
        if !self.quiet {
            self.line(Mark::Warn, message);
        }
    }

    /// Print an informational line
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.line(Mark::Info, message);
        }
    }

    fn line(&self, mark: Mark, message: &str) {
        let prefix = if self.use_color {
            mark.styled()
        } else {
            mark.plain().to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }
}

#[derive(Debug, Clone, Copy)]
enum Mark {
    Ok,
    Fail,
    Warn,
    Info,
}

impl Mark {
    const fn plain(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Fail => "FAIL",
            Self::Warn => "WARN",
            Self::Info => "INFO",
        }
    }

    fn styled(self) -> String {
        match self {
            Self::Ok => style("✓").green().bold(),
            Self::Fail => style("✗").red().bold(),
            Self::Warn => style("⚠").yellow().bold(),
            Self::Info => style("ℹ").blue().bold(),
        }
        .to_string()
    }
}
