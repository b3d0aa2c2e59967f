use std::io::Write;

use hydrocast_core::{
    FetchOutcome, HourlyPrecipitation, ProviderId, RainClassification, Series, SeriesKind,
};
use serde::Serialize;

use crate::error::CliError;

/// JSON document written to stdout for one fetch.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub kind: SeriesKind,
    pub source: ProviderId,
    pub source_name: &'static str,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'a str>,
    pub entries: usize,
    pub series: &'a Series,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rain_days: Vec<RainClassification>,
}

impl<'a> Report<'a> {
    pub fn new(outcome: &'a FetchOutcome) -> Self {
        Self {
            kind: outcome.series.kind(),
            source: outcome.source,
            source_name: outcome.source.display_name(),
            from_cache: outcome.from_cache,
            notice: outcome.notice.as_deref(),
            entries: outcome.series.len(),
            series: &outcome.series,
            rain_days: outcome.series.rain_classifications(),
        }
    }
}

/// JSON document written to stdout for a forecast.
#[derive(Debug, Serialize)]
pub struct ForecastReport<'a> {
    pub source: ProviderId,
    pub hours: usize,
    pub total_mm: f64,
    pub entries: Vec<ForecastEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ForecastEntry<'a> {
    #[serde(flatten)]
    pub hour: &'a HourlyPrecipitation,
    pub description: &'static str,
}

impl<'a> ForecastReport<'a> {
    pub fn new(hours: &'a [HourlyPrecipitation]) -> Self {
        Self {
            source: ProviderId::OpenMeteo,
            hours: hours.len(),
            total_mm: hours.iter().map(|hour| hour.precipitation).sum(),
            entries: hours
                .iter()
                .map(|hour| ForecastEntry {
                    hour,
                    description: hour.description(),
                })
                .collect(),
        }
    }
}

pub fn render(outcome: &FetchOutcome, pretty: bool) -> Result<(), CliError> {
    write_json(&Report::new(outcome), pretty)
}

pub fn render_forecast(hours: &[HourlyPrecipitation], pretty: bool) -> Result<(), CliError> {
    write_json(&ForecastReport::new(hours), pretty)
}

fn write_json<T: Serialize>(report: &T, pretty: bool) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut handle, report)?;
    } else {
        serde_json::to_writer(&mut handle, report)?;
    }
    writeln!(handle)?;
    Ok(())
}
