//! Appwarden CLI: poke a live Appium endpoint with the harness primitives
//!
//! ## Usage
//!
//! ```bash
//! appwarden check                                   # Open and close a session
//! appwarden reset -c appwarden.yaml                 # Log out and relaunch the app
//! appwarden screenshot home                         # Save the current screen
//! appwarden find accessibility-id "Sign out" --click
//! appwarden config --validate                       # Print the effective config
//! ```

use appwarden::{FailureCapture, HarnessConfig, Locator, RemoteDriver, SessionManager};
use appwarden_cli::handlers::{self, ConfigOverrides, FindRequest};
use appwarden_cli::{
    logging, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, ConfigArgs, FindArgs,
    ProgressReporter, ScreenshotArgs, Verbosity,
};
use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    logging::init(config.verbosity);
    let mut reporter =
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());

    let overrides = ConfigOverrides {
        endpoint: cli.endpoint.clone(),
        app_id: cli.app_id.clone(),
        device: cli.device.clone(),
    };
    let harness = handlers::resolve_config(cli.config.as_deref(), &overrides)?;

    let result = match &cli.command {
        Commands::Config(args) => run_config(&harness, args, cli.json),
        Commands::Check => run_check(&harness, &mut reporter, cli.json),
        Commands::Reset => run_reset(&harness, &mut reporter, cli.json),
        Commands::Screenshot(args) => run_screenshot(&harness, args, &mut reporter, cli.json),
        Commands::Find(args) => run_find(&harness, args, &mut reporter, cli.json),
    };
    reporter.finish();
    result
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(ColorChoice::from(cli.color))
}

fn connect(harness: &HarnessConfig) -> CliResult<SessionManager<RemoteDriver>> {
    harness.validate()?;
    let driver = RemoteDriver::from_config(harness);
    Ok(SessionManager::from_config(driver, harness))
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::from(appwarden::HarnessError::from(e)))?;
    println!("{text}");
    Ok(())
}

fn run_config(harness: &HarnessConfig, args: &ConfigArgs, json: bool) -> CliResult<()> {
    if args.validate {
        harness.validate()?;
    }
    if json {
        print_json(harness)
    } else {
        print!("{}", harness.to_yaml()?);
        Ok(())
    }
}

fn run_check(harness: &HarnessConfig, reporter: &mut ProgressReporter, json: bool) -> CliResult<()> {
    let mut manager = connect(harness)?;
    reporter.start_spinner(&format!("Opening session at {}", harness.endpoint));
    let report = handlers::check(&mut manager)?;
    reporter.success(&format!(
        "{} session {} for {}",
        report.platform, report.session_id, report.app_id
    ));

    if json {
        print_json(&report)
    } else {
        println!("viewport {}x{}", report.window.width, report.window.height);
        Ok(())
    }
}

fn run_reset(harness: &HarnessConfig, reporter: &mut ProgressReporter, json: bool) -> CliResult<()> {
    let mut manager = connect(harness)?;
    reporter.start_spinner("Resetting app state");
    let report = handlers::reset(&mut manager, harness)?;
    if let Some(logout) = &report.logout {
        reporter.info(&format!("Logout ended in {logout:?}"));
    }
    for failure in &report.failures {
        reporter.warning(&failure.to_string());
    }
    reporter.success(&format!("App reset by {}", report.recovered_by));

    if json {
        print_json(&report)
    } else {
        println!(
            "was logged in: {}, recovered by: {}",
            report.was_logged_in, report.recovered_by
        );
        Ok(())
    }
}

fn run_screenshot(
    harness: &HarnessConfig,
    args: &ScreenshotArgs,
    reporter: &mut ProgressReporter,
    json: bool,
) -> CliResult<()> {
    let mut manager = connect(harness)?;
    let capture = args
        .dir
        .as_ref()
        .map_or_else(|| FailureCapture::from_config(harness), FailureCapture::new);
    reporter.start_spinner("Taking screenshot");
    let path = handlers::screenshot(&mut manager, &capture, &args.name)?;
    reporter.success("Screenshot saved");

    if json {
        print_json(&serde_json::json!({ "path": path }))
    } else {
        println!("{}", path.display());
        Ok(())
    }
}

fn run_find(
    harness: &HarnessConfig,
    args: &FindArgs,
    reporter: &mut ProgressReporter,
    json: bool,
) -> CliResult<()> {
    let mut manager = connect(harness)?;
    let request = FindRequest {
        locator: Locator::new(args.strategy, args.query.clone()),
        max_attempts: args.max_attempts,
        direction: args.direction.map(Into::into),
        click: args.click,
    };
    reporter.start_spinner(&format!("Looking for {}", request.locator));
    let report = handlers::find(&mut manager, harness, &request)?;
    reporter.success(&format!(
        "Found {} after {} scroll(s)",
        report.locator, report.scrolls
    ));

    if json {
        print_json(&report)
    } else {
        println!("{}", report.element);
        Ok(())
    }
}
