//! Appwarden CLI library
//!
//! Command-line front end for the Appwarden harness: session checks,
//! one-off app resets, screenshots and scroll searches against a live
//! Appium endpoint.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, DirectionArg, FindArgs, ScreenshotArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
