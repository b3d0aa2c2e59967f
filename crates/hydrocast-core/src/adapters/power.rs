//! Secondary provider: NASA POWER hourly point API.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{decode, ensure_success, number, transport_error};
use crate::data_source::{DataSource, FetchFuture, SeriesRequest};
use crate::http_client::{build_url, HttpClient, HttpRequest};
use crate::normalize::{parse_timestamp, pressure_to_hpa};
use crate::{ProviderError, ProviderId, Sample};

pub const ENDPOINT: &str = "https://power.larc.nasa.gov/api/temporal/hourly/point";

const PARAMETERS: &str = "T2M,RH2M,PS,PRECTOTCORR";

/// Value POWER reports when it has no data for an hour.
const FILL_VALUE: f64 = -999.0;

#[derive(Clone)]
pub struct PowerAdapter {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    timeout: Duration,
    user_agent: String,
}

impl PowerAdapter {
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

    /// Day-granularity query; POWER ignores the hour of the window bounds.
    pub fn request_url(&self, request: &SeriesRequest) -> String {
        let longitude = request.coordinate.lon().to_string();
        let latitude = request.coordinate.lat().to_string();
        let start = request.start.format_compact_date();
        let end = request.end.format_compact_date();

        build_url(
            &self.endpoint,
            &[
                ("parameters", PARAMETERS),
                ("community", "AG"),
                ("longitude", longitude.as_str()),
                ("latitude", latitude.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("format", "JSON"),
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
        debug!(%url, "requesting POWER hourly point");
        let http_request = HttpRequest::get(url)
            .with_header("user-agent", self.user_agent.as_str())
            .with_header("accept", "application/json")
            .with_timeout(self.timeout);

        let response = self
            .http_client
            .execute(http_request)
            .await
            .map_err(|error| transport_error(ProviderId::NasaPower, error))?;
        ensure_success(ProviderId::NasaPower, &response)?;

        let payload: PowerResponse = decode(ProviderId::NasaPower, &response.body)?;
        let samples = normalize_parameters(
            &payload.properties.parameter,
            request.coordinate.lat(),
            request.coordinate.lon(),
        );
        debug!(samples = samples.len(), "parsed POWER samples");
        Ok(samples)
    }
}

impl DataSource for PowerAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::NasaPower
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
struct PowerResponse {
    properties: PowerProperties,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: PowerParameters,
}

/// Timestamp key to raw value; non-numeric entries are read as absent.
type HourlyValues = BTreeMap<String, Value>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct PowerParameters {
    /// °C
    #[serde(default)]
    t2m: Option<HourlyValues>,
    /// %
    #[serde(default)]
    rh2m: Option<HourlyValues>,
    /// kPa, per the POWER docs
    #[serde(default)]
    ps: Option<HourlyValues>,
    /// mm/h
    #[serde(default)]
    prectotcorr: Option<HourlyValues>,
}

fn lookup(values: &Option<HourlyValues>, key: &str) -> Option<f64> {
    values
        .as_ref()
        .and_then(|values| values.get(key))
        .and_then(number)
        .filter(|value| *value != FILL_VALUE)
}

/// Union of timestamp keys across parameters, one sample per parseable key.
fn normalize_parameters(parameters: &PowerParameters, lat: f64, lon: f64) -> Vec<Sample> {
    let keys = [
        &parameters.t2m,
        &parameters.rh2m,
        &parameters.ps,
        &parameters.prectotcorr,
    ]
    .into_iter()
    .flatten()
    .flat_map(|values| values.keys())
    .collect::<BTreeSet<_>>();

    let mut samples = keys
        .into_iter()
        .filter_map(|key| {
            let timestamp = parse_timestamp(key)?;
            Some(Sample {
                timestamp,
                latitude: lat,
                longitude: lon,
                precipitation_rate: lookup(&parameters.prectotcorr, key),
                soil_moisture: None,
                temperature: lookup(&parameters.t2m, key),
                relative_humidity: lookup(&parameters.rh2m, key),
                pressure: lookup(&parameters.ps, key).map(pressure_to_hpa),
            })
        })
        .collect::<Vec<_>>();

    samples.sort_by_key(|sample| sample.timestamp);
    samples
}
