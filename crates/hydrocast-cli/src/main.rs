mod cli;
mod error;
mod output;

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use hydrocast_core::{Coordinate, OrchestratorBuilder, OrchestratorConfig, SeriesKind};
use tracing::debug;
use tracing_subscriber::filter::EnvFilter;

use crate::cli::{Cli, Command, LogLevel};
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

/// Logs go to stderr so stdout stays a single JSON document.
fn init_tracing(level: LogLevel) {
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!("{},reqwest=warn,hyper=warn", level.as_str()))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = OrchestratorConfig::from_env();
    if let Some(token) = cli.token.filter(|token| !token.trim().is_empty()) {
        config.credential = Some(token);
    }
    if let Some(secs) = cli.timeout_secs {
        config.http_timeout = Duration::from_secs(secs);
    }

    let orchestrator = OrchestratorBuilder::new()
        .with_config(config)
        .with_real_client()
        .build();

    let (kind, args) = match &cli.command {
        Command::Hourly(args) => (SeriesKind::Hourly, args),
        Command::Daily(args) => (SeriesKind::Daily, args),
        Command::Forecast(args) => {
            let coordinate = Coordinate::new(args.lat, args.lon)?;
            debug!(%coordinate, "starting forecast fetch");
            let hours = orchestrator.fetch_precipitation_forecast(coordinate).await?;
            return output::render_forecast(&hours, cli.pretty);
        }
    };
    let coordinate = Coordinate::new(args.lat, args.lon)?;
    let days = args.window_days();
    debug!(%coordinate, days, %kind, "starting fetch");

    let outcome = orchestrator.fetch(coordinate, days, kind).await?;
    output::render(&outcome, cli.pretty)
}
