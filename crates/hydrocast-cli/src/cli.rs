//! CLI argument definitions for hydrocast.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hourly` | Fetch the trailing hourly series for a point |
//! | `daily` | Fetch daily precipitation totals with rain classification |
//! | `forecast` | Precipitation outlook for the next 24 hours |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | `warn` | Log verbosity on stderr (`RUST_LOG` wins) |
//! | `--token` | env | Bearer credential for the primary provider |
//! | `--timeout-secs` | `30` | Per-request HTTP timeout |
//!
//! # Examples
//!
//! ```bash
//! hydrocast daily --lat 55.75 --lon 37.62 --range week --pretty
//! hydrocast hourly --lat 55.75 --lon 37.62 --days 2 --log-level debug
//! hydrocast forecast --lat 55.75 --lon 37.62
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use hydrocast_core::TimeRange;

/// Historical hydrology and weather series for a point, with provider fallback.
#[derive(Debug, Parser)]
#[command(
    name = "hydrocast",
    author,
    version,
    about = "Historical hydrology time series with provider fallback"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log level for stderr output. Ignored when RUST_LOG is set.
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Bearer credential for the primary provider.
    ///
    /// Defaults to HYDROCAST_EDL_TOKEN, then EDL_TOKEN.
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Hourly samples, most recent first.
    Hourly(SeriesArgs),
    /// Daily precipitation totals, most recent first.
    Daily(SeriesArgs),
    /// Hourly precipitation forecast for the next 24 hours.
    Forecast(PointArgs),
}

#[derive(Debug, Args)]
pub struct PointArgs {
    /// Latitude in degrees, [-90, 90].
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in degrees, [-180, 180].
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    /// Latitude in degrees, [-90, 90].
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in degrees, [-180, 180].
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Window preset.
    #[arg(long, value_enum, default_value_t = RangeArg::Week, conflicts_with = "days")]
    pub range: RangeArg,

    /// Explicit window length in days.
    #[arg(long)]
    pub days: Option<u32>,
}

impl SeriesArgs {
    pub fn window_days(&self) -> u32 {
        self.days
            .unwrap_or_else(|| TimeRange::from(self.range).days())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RangeArg {
    Day,
    Week,
    Month,
    Quarter,
}

impl From<RangeArg> for TimeRange {
    fn from(value: RangeArg) -> Self {
        match value {
            RangeArg::Day => Self::Day,
            RangeArg::Week => Self::Week,
            RangeArg::Month => Self::Month,
            RangeArg::Quarter => Self::Quarter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_daily_with_negative_longitude() {
        let cli = Cli::try_parse_from([
            "hydrocast", "daily", "--lat", "40.7", "--lon", "-74.0", "--range", "month",
        ])
        .expect("valid args");

        let Command::Daily(args) = cli.command else {
            panic!("expected daily");
        };
        assert_eq!(args.lon, -74.0);
        assert_eq!(args.window_days(), 30);
        assert_eq!(cli.log_level, LogLevel::Warn);
    }

    #[test]
    fn explicit_days_win_over_default_range() {
        let cli = Cli::try_parse_from([
            "hydrocast", "hourly", "--lat", "1", "--lon", "2", "--days", "3", "--pretty",
        ])
        .expect("valid args");

        let Command::Hourly(args) = cli.command else {
            panic!("expected hourly");
        };
        assert_eq!(args.window_days(), 3);
        assert!(cli.pretty);
    }

    #[test]
    fn forecast_takes_only_a_point() {
        let cli = Cli::try_parse_from(["hydrocast", "forecast", "--lat", "-33.87", "--lon", "151.21"])
            .expect("valid args");

        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert_eq!(args.lat, -33.87);
        assert!(Cli::try_parse_from([
            "hydrocast", "forecast", "--lat", "1", "--lon", "2", "--days", "3",
        ])
        .is_err());
    }

    #[test]
    fn range_and_days_conflict() {
        let result = Cli::try_parse_from([
            "hydrocast", "daily", "--lat", "1", "--lon", "2", "--days", "3", "--range", "day",
        ]);
        assert!(result.is_err());
    }
}
