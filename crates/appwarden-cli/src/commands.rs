//! CLI command definitions using clap

use appwarden::{ScrollDirection, Strategy};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Appwarden: session, reset and failure-capture tooling for Appium mobile tests
#[derive(Parser, Debug)]
#[command(name = "appwarden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except failures
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Harness configuration file (YAML)
    #[arg(short, long, global = true, env = "APPWARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Remote automation endpoint, overrides the file and APPWARDEN_ENDPOINT
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Application package or bundle id, overrides the file and APPWARDEN_APP_ID
    #[arg(long, global = true)]
    pub app_id: Option<String>,

    /// Device name, overrides the file and APPWARDEN_DEVICE
    #[arg(long, global = true)]
    pub device: Option<String>,

    /// Print command results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a session, report the device viewport and close it again
    Check,

    /// Bring the app to a logged-out, freshly launched state
    Reset,

    /// Save a screenshot of the current screen
    Screenshot(ScreenshotArgs),

    /// Search for an element, scrolling when it is not on screen
    Find(FindArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the screenshot command
#[derive(Args, Debug)]
pub struct ScreenshotArgs {
    /// Artifact name; the file becomes `{name}_{timestamp}.png`
    pub name: String,

    /// Output directory, defaults to the configured screenshot directory
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

/// Arguments for the find command
#[derive(Args, Debug)]
pub struct FindArgs {
    /// Locator strategy: xpath, accessibility-id, id, class-name, android-uiautomator,
    /// ios-predicate or ios-class-chain
    #[arg(value_parser = parse_strategy)]
    pub strategy: Strategy,

    /// Locator query
    pub query: String,

    /// Lookup budget, defaults to the configured value
    #[arg(short = 'n', long)]
    pub max_attempts: Option<u32>,

    /// Scroll direction, defaults to the configured gesture
    #[arg(long)]
    pub direction: Option<DirectionArg>,

    /// Tap the element once found
    #[arg(long)]
    pub click: bool,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Fail when the effective configuration is not usable
    #[arg(long)]
    pub validate: bool,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Scroll direction argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum DirectionArg {
    /// Reveal content further down
    Down,
    /// Reveal content further up
    Up,
    /// Reveal content to the right
    Right,
    /// Reveal content to the left
    Left,
}

impl From<DirectionArg> for ScrollDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Down => Self::Down,
            DirectionArg::Up => Self::Up,
            DirectionArg::Right => Self::Right,
            DirectionArg::Left => Self::Left,
        }
    }
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    s.parse::<Strategy>().map_err(|e| e.to_string())
}
