mod config;
mod logging;
mod runner;
mod signals;

use clap::Parser;
use config::ServiceConfig;
use logging::LogHandle;
use runner::ServiceRunner;
use signals::{Shutdown, SignalHandler};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// PyLFTP daemon: runs in the foreground until SIGINT or SIGTERM.
#[derive(Parser, Debug)]
#[command(name = "pylftpd", version, about)]
pub struct Cli {
    /// Directory for log files (logs go to stdout when omitted)
    #[arg(long, value_name = "DIR")]
    logdir: Option<PathBuf>,

    /// Enable debug logs
    #[arg(long)]
    debug: bool,

    /// Optional TOML config file; command-line flags take precedence
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match init_logging(&cli) {
        Ok((config, log)) => run(cli, config, log).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pylftpd: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Resolve settings and install the service log as the global default.
fn init_logging(cli: &Cli) -> Result<(ServiceConfig, LogHandle), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    }
    .with_overrides(cli.logdir.clone(), cli.debug);

    let log = LogHandle::open(&config.logging)?;
    tracing::dispatcher::set_global_default(log.dispatch())?;
    Ok((config, log))
}

// Call only after `init_logging`: the span must be created under the
// installed dispatcher.
#[tracing::instrument(skip_all)]
async fn run(
    cli: Cli,
    config: ServiceConfig,
    log: LogHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!(?cli, ?config, "parsed CLI arguments");
    tracing::debug!(
        level = %log.level(),
        log_file = ?log.log_file(),
        "logging configured"
    );

    let shutdown = Arc::new(Shutdown::new());
    let _signals = SignalHandler::install(Arc::clone(&shutdown))?;

    let summary = ServiceRunner::new(shutdown).run().await;
    tracing::debug!(ticks = summary.ticks, elapsed = ?summary.elapsed, "run loop exited");

    log.flush()?;
    Ok(())
}
