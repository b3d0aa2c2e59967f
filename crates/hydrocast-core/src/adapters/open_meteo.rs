//! Tertiary provider: Open-Meteo ERA5 reanalysis archive.
//!
//! Also serves the daily gap-fill pass, since it publishes recent days
//! sooner than the NASA services.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{decode, ensure_success, number, transport_error};
use crate::data_source::{DataSource, FetchFuture, SeriesRequest};
use crate::http_client::{build_url, HttpClient, HttpRequest};
use crate::normalize::parse_timestamp;
use crate::{ProviderError, ProviderId, Sample};

pub const ENDPOINT: &str = "https://archive-api.open-meteo.com/v1/era5";

const HOURLY_VARIABLES: &str = "temperature_2m,relative_humidity_2m,surface_pressure,precipitation";

#[derive(Clone)]
pub struct OpenMeteoAdapter {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    timeout: Duration,
    user_agent: String,
}

impl OpenMeteoAdapter {
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

    pub fn request_url(&self, request: &SeriesRequest) -> String {
        let latitude = request.coordinate.lat().to_string();
        let longitude = request.coordinate.lon().to_string();
        let start = request.start.format_iso_date();
        let end = request.end.format_iso_date();

        build_url(
            &self.endpoint,
            &[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("start_date", start.as_str()),
                ("end_date", end.as_str()),
                ("hourly", HOURLY_VARIABLES),
                ("timezone", "UTC"),
            ],
        )
    }

    async fn fetch_samples(
        &self,
        request: &SeriesRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Sample>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let url = self.request_url(request);
        debug!(%url, "requesting ERA5 archive");
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

        let payload: ArchiveResponse = decode(ProviderId::OpenMeteo, &response.body)?;
        let samples = payload
            .hourly
            .into_samples(request.coordinate.lat(), request.coordinate.lon());
        debug!(samples = samples.len(), "parsed ERA5 samples");
        Ok(samples)
    }
}

impl DataSource for OpenMeteoAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    fn fetch<'a>(
        &'a self,
        request: &'a SeriesRequest,
        cancel: &'a CancellationToken,
    ) -> FetchFuture<'a> {
        Box::pin(self.fetch_samples(request, cancel))
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: HourlyArrays,
}

/// Parallel arrays indexed like `time`. Entries may be `null`.
#[derive(Debug, Deserialize)]
struct HourlyArrays {
    time: Vec<Value>,
    #[serde(default)]
    temperature_2m: Vec<Value>,
    #[serde(default)]
    relative_humidity_2m: Vec<Value>,
    #[serde(default)]
    surface_pressure: Vec<Value>,
    #[serde(default)]
    precipitation: Vec<Value>,
}

fn number_at(values: &[Value], index: usize) -> Option<f64> {
    values.get(index).and_then(number)
}

impl HourlyArrays {
    fn into_samples(self, lat: f64, lon: f64) -> Vec<Sample> {
        let mut samples = self
            .time
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let timestamp = raw.as_str().and_then(parse_timestamp)?;
                Some(Sample {
                    timestamp,
                    latitude: lat,
                    longitude: lon,
                    precipitation_rate: number_at(&self.precipitation, index),
                    soil_moisture: None,
                    temperature: number_at(&self.temperature_2m, index),
                    relative_humidity: number_at(&self.relative_humidity_2m, index),
                    // ERA5 surface pressure is already hPa.
                    pressure: number_at(&self.surface_pressure, index),
                })
            })
            .collect::<Vec<_>>();

        samples.sort_by_key(|sample| sample.timestamp);
        samples
    }
}
