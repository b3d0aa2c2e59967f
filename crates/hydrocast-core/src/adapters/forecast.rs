//! Next-day precipitation outlook from the Open-Meteo forecast API.
//!
//! Not part of the historical fallback chain; it answers a single question
//! ("how much rain in the coming hours") and needs no credential.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{decode, ensure_success, number, transport_error};
use crate::http_client::{build_url, HttpClient, HttpRequest};
use crate::normalize::parse_timestamp;
use crate::{Coordinate, HourlyPrecipitation, ProviderError, ProviderId, UtcDateTime};

pub const ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";

/// Length of the outlook and the maximum number of entries returned.
pub const FORECAST_HOURS: u32 = 24;

#[derive(Clone)]
pub struct ForecastAdapter {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    timeout: Duration,
    user_agent: String,
}

impl ForecastAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            endpoint: ENDPOINT.to_owned(),
            timeout: Duration::from_secs(30),
            user_agent: String::from(concat!("hydrocast/", env!("CARGO_PKG_VERSION"))),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Day-granularity query spanning `now` and `now + 24h`.
    pub fn request_url(&self, coordinate: Coordinate, now: UtcDateTime) -> String {
        let latitude = coordinate.lat().to_string();
        let longitude = coordinate.lon().to_string();
        let start = now.format_iso_date();
        let end = now.plus_hours(FORECAST_HOURS).format_iso_date();

        build_url(
            &self.endpoint,
            &[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("hourly", "precipitation"),
                ("start_date", start.as_str()),
                ("end_date", end.as_str()),
                ("timezone", "UTC"),
            ],
        )
    }

    /// Hours in `[now, now + 24h)`, ascending, negative amounts clamped to 0.
    pub async fn fetch(
        &self,
        coordinate: Coordinate,
        now: UtcDateTime,
        cancel: &CancellationToken,
    ) -> Result<Vec<HourlyPrecipitation>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let url = self.request_url(coordinate, now);
        debug!(%url, "requesting precipitation forecast");
        let http_request = HttpRequest::get(url)
            .with_header("user-agent", self.user_agent.as_str())
            .with_header("accept", "application/json")
            .with_timeout(self.timeout);

        let response = self
            .http_client
            .execute(http_request)
            .await
            .map_err(|error| transport_error(ProviderId::OpenMeteo, error))?;
        ensure_success(ProviderId::OpenMeteo, &response)?;

        let payload: ForecastResponse = decode(ProviderId::OpenMeteo, &response.body)?;
        let hours = payload
            .hourly
            .map(|hourly| hourly.upcoming(now))
            .unwrap_or_default();
        debug!(hours = hours.len(), "parsed precipitation forecast");
        Ok(hours)
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    hourly: Option<ForecastArrays>,
}

#[derive(Debug, Deserialize)]
struct ForecastArrays {
    time: Vec<Value>,
    /// A missing array means no precipitation is forecast.
    #[serde(default)]
    precipitation: Option<Vec<Value>>,
}

impl ForecastArrays {
    fn upcoming(self, now: UtcDateTime) -> Vec<HourlyPrecipitation> {
        let end = now.plus_hours(FORECAST_HOURS);
        let mut hours = self
            .time
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let timestamp = raw.as_str().and_then(parse_timestamp)?;
                if timestamp < now || timestamp >= end {
                    return None;
                }
                let precipitation = match &self.precipitation {
                    Some(values) => values.get(index).and_then(number)?,
                    None => 0.0,
                };
                Some(HourlyPrecipitation {
                    timestamp,
                    precipitation: precipitation.max(0.0),
                })
            })
            .collect::<Vec<_>>();

        hours.sort_by_key(|hour| hour.timestamp);
        hours.truncate(FORECAST_HOURS as usize);
        hours
    }
}
