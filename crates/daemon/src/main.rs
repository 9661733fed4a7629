//! pemsync - Main entry point
//!
//! Sidecar that keeps PEM files in sync with the TLS material embedded in a
//! host application's JSON configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use pemsync_config::{validate_startup, Settings};
use pemsync_daemon::triggers::{
    dispatch, run_bounded, run_ticker, spawn_signal_listener, trigger_bus, ConfigWatcher,
};
use pemsync_daemon::{build_scheduler, RenewalScheduler, Trigger};

/// pemsync - extract TLS material from a config document into PEM files
#[derive(Parser, Debug)]
#[command(name = "pemsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration document path
    #[arg(short = 'c', long = "config", env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Validate settings and directories, then exit
    #[arg(short = 't', long = "test")]
    test: bool,

    /// Run a single evaluation and exit
    #[arg(long = "once")]
    once: bool,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = Settings::from_env().context("Failed to read settings from environment")?;
    if let Some(path) = cli.config {
        settings.config_path = path;
    }

    check_startup(&settings)?;

    if cli.test {
        return test_settings(&settings);
    }

    let scheduler = Arc::new(build_scheduler(&settings));

    if cli.once {
        let outcome = scheduler.trigger(Trigger::Startup);
        if outcome.is_failure() {
            bail!("Evaluation failed: {:?}", outcome);
        }
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    runtime.block_on(run_daemon(settings, scheduler))
}

/// Initialize logging; `LOG_FORMAT=json` switches to JSON lines
fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Fatal directory checks
fn check_startup(settings: &Settings) -> Result<()> {
    let validation = validate_startup(settings);

    for warning in &validation.warnings {
        warn!("{}", warning.message);
    }

    if !validation.is_valid() {
        for e in &validation.errors {
            error!("{}", e);
        }
        bail!(
            "Startup validation failed with {} error(s)",
            validation.errors.len()
        );
    }

    Ok(())
}

/// Report effective settings and exit
fn test_settings(settings: &Settings) -> Result<()> {
    info!("Settings test successful:");
    info!("  - config: {}", settings.config_path.display());
    info!("  - section: {}", settings.config_section);
    if settings.polling_enabled() {
        info!("  - check interval: {}s", settings.check_interval.as_secs());
    } else {
        info!("  - check interval: disabled (expiry-driven only)");
    }
    info!("  - watching: {}", settings.watch_enabled);
    info!("  - timezone: {}", settings.display_timezone);
    for (index, target) in settings.targets.iter().enumerate() {
        if target.combined {
            info!(
                "  - target {}: {} (combined: {})",
                index + 1,
                target.directory.display(),
                target.combined_file_name
            );
        } else {
            info!(
                "  - target {}: {} (cert.pem + key.pem)",
                index + 1,
                target.directory.display()
            );
        }
    }

    println!("pemsync: settings for {} are valid", settings.config_path.display());
    Ok(())
}

async fn run_daemon(settings: Settings, scheduler: Arc<RenewalScheduler>) -> Result<()> {
    let (bus, rx) = trigger_bus();

    spawn_signal_listener(bus.clone()).context("Failed to register signal handlers")?;

    // Watch before the initial renewal so no edit falls in between
    let _watcher = if settings.watch_enabled {
        let watcher = ConfigWatcher::start(&settings.config_path, bus.clone())
            .context("Failed to establish configuration watch")?;
        Some(watcher)
    } else {
        info!("Configuration watching disabled");
        None
    };

    run_bounded(scheduler.clone(), Trigger::Startup, settings.evaluation_timeout).await;

    tokio::spawn(run_ticker(
        settings.check_interval,
        bus.clone(),
        scheduler.subscribe_expiry(),
    ));
    drop(bus);

    info!(
        config = %settings.config_path.display(),
        targets = settings.targets.len(),
        polling = settings.polling_enabled(),
        timezone = %settings.display_timezone,
        "pemsync started"
    );

    dispatch(scheduler, rx, settings.evaluation_timeout).await;

    info!("pemsync stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsStr;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_flag_reads_config_path_env() {
        let command = Cli::command();
        let config = command
            .get_arguments()
            .find(|arg| arg.get_id() == "config")
            .unwrap();
        assert_eq!(config.get_env(), Some(OsStr::new("CONFIG_PATH")));
    }

    #[test]
    fn test_flags_parse() {
        let cli = Cli::try_parse_from(["pemsync", "--once", "-c", "/tmp/app.json"]).unwrap();
        assert!(cli.once);
        assert!(!cli.test);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/app.json")));
    }
}
