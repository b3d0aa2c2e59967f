//! Primary provider: NASA hydrology point time-series service.
//!
//! The service path is undocumented and has moved between hosts, so every
//! call is fanned out over a list of candidate URLs (base endpoints × query
//! shapes) and the first usable response wins.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{decode, ensure_success, lenient_number, lenient_text, transport_error};
use crate::data_source::{DataSource, FetchFuture, SeriesRequest};
use crate::http_client::{build_url, HttpClient, HttpRequest, SharedCredential};
use crate::normalize::{kelvin_to_celsius, parse_timestamp, pressure_to_hpa, relative_humidity};
use crate::{Coordinate, ProviderError, ProviderId, Sample, SeriesKind, UtcDateTime};

pub const DEFAULT_BASE_CANDIDATES: [&str; 6] = [
    "https://hydro1.gesdisc.eosdis.nasa.gov/daac-bin/timeseries.cgi",
    "https://hydro1.gesdisc.eosdis.nasa.gov/daac-bin/timeseries",
    "https://hydro1.gesdisc.eosdis.nasa.gov/daac-bin/access/timeseries.cgi",
    "https://disc.gsfc.nasa.gov/daac-bin/timeseries.cgi",
    "https://disc.gsfc.nasa.gov/daac-bin/timeseries",
    "https://disc.gsfc.nasa.gov/daac-bin/access/timeseries.cgi",
];

/// Query parameter naming the output format; the service has accepted both.
const FORMAT_KEYS: [&str; 2] = ["type", "format"];

const ACCEPT: &str = "application/json,*/*;q=0.8";

/// Variable group requested in one sub-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableGroup {
    /// Hourly precipitation, temperature, pressure and specific humidity.
    Atmospheric,
    /// 3-hourly top-layer soil moisture.
    Soil,
    /// Hourly precipitation only, for daily totals.
    Precipitation,
}

impl VariableGroup {
    pub const fn dataset(self) -> &'static str {
        match self {
            Self::Atmospheric | Self::Precipitation => "NLDAS_FORA0125_H.002",
            Self::Soil => "GLDAS_NOAH025_3H_2.0",
        }
    }

    pub const fn variables(self) -> &'static [&'static str] {
        match self {
            Self::Atmospheric => &["apcpsfc", "tmp2m", "pressfc", "spfh2m"],
            Self::Soil => &["SoilMoi0_10cm_inst"],
            Self::Precipitation => &["apcpsfc"],
        }
    }
}

/// Primary provider adapter.
#[derive(Clone)]
pub struct TssAdapter {
    http_client: Arc<dyn HttpClient>,
    credential: SharedCredential,
    base_candidates: Vec<String>,
    timeout: Duration,
    user_agent: String,
}

impl TssAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, credential: SharedCredential) -> Self {
        Self {
            http_client,
            credential,
            base_candidates: DEFAULT_BASE_CANDIDATES
                .iter()
                .map(|base| (*base).to_owned())
                .collect(),
            timeout: Duration::from_secs(30),
            user_agent: String::from(concat!("hydrocast/", env!("CARGO_PKG_VERSION"))),
        }
    }

    pub fn with_base_candidates(mut self, base_candidates: Vec<String>) -> Self {
        self.base_candidates = base_candidates;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Cross product of base endpoints and format-key shapes, in try order.
    pub fn candidate_urls(
        &self,
        group: VariableGroup,
        request: &SeriesRequest,
    ) -> Result<Vec<String>, ProviderError> {
        let variables = group.variables().join(",");
        let location = format!(
            "GEOM:POINT({} {})",
            request.coordinate.lon(),
            request.coordinate.lat()
        );
        let start = request.start.format_rfc3339();
        let end = request.end.format_rfc3339();

        let urls = self
            .base_candidates
            .iter()
            .map(|base| base.trim())
            .filter(|base| base.starts_with("https://") || base.starts_with("http://"))
            .flat_map(|base| {
                FORMAT_KEYS.iter().map(|format_key| {
                    build_url(
                        base,
                        &[
                            ("dataset", group.dataset()),
                            ("variable", variables.as_str()),
                            ("location", location.as_str()),
                            ("startDate", start.as_str()),
                            ("endDate", end.as_str()),
                            (*format_key, "json"),
                        ],
                    )
                })
            })
            .collect::<Vec<_>>();

        if urls.is_empty() {
            return Err(ProviderError::UrlBuildFailure);
        }
        debug!(count = urls.len(), first = %urls[0], "built candidate urls");
        Ok(urls)
    }

    async fn fetch_group(
        &self,
        group: VariableGroup,
        request: &SeriesRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<TssRecord>, ProviderError> {
        let urls = self.candidate_urls(group, request)?;
        let records = self.fetch_first_success(&urls, cancel).await?.into_records();
        debug!(?group, records = records.len(), "parsed time-series records");
        Ok(records)
    }

    /// Tries each candidate once; returns the first decodable JSON payload.
    async fn fetch_first_success(
        &self,
        urls: &[String],
        cancel: &CancellationToken,
    ) -> Result<TssResponse, ProviderError> {
        let mut last_error = None;

        for url in urls {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            match self.fetch_candidate(url).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    debug!(%url, error = %error, "candidate failed");
                    last_error = Some(error);
                }
            }
        }

        Err(ProviderError::AllCandidatesFailed {
            attempted: urls.len(),
            last: Box::new(last_error.unwrap_or(ProviderError::UrlBuildFailure)),
        })
    }

    async fn fetch_candidate(&self, url: &str) -> Result<TssResponse, ProviderError> {
        let request = HttpRequest::get(url)
            .with_header("user-agent", self.user_agent.as_str())
            .with_header("accept", ACCEPT)
            .with_auth(&self.credential.auth())
            .with_timeout(self.timeout);

        debug!(%url, "requesting candidate");
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| transport_error(ProviderId::NasaTss, error))?;
        debug!(status = response.status, bytes = response.body.len(), "candidate responded");

        if response.status == 401 || response.status == 403 {
            return Err(ProviderError::Unauthorized);
        }
        ensure_success(ProviderId::NasaTss, &response)?;

        if looks_like_html(&response.body) {
            debug!("HTML received instead of JSON, likely a login wall or soft 404");
            return Err(ProviderError::invalid_response(
                "HTML page returned",
                &response.body,
            ));
        }

        decode(ProviderId::NasaTss, &response.body)
    }

    async fn fetch_samples(
        &self,
        request: &SeriesRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Sample>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        match request.kind {
            SeriesKind::Hourly => {
                let (atmospheric, soil) = tokio::try_join!(
                    self.fetch_group(VariableGroup::Atmospheric, request, cancel),
                    self.fetch_group(VariableGroup::Soil, request, cancel),
                )?;
                Ok(merge_records(&atmospheric, &soil, request.coordinate))
            }
            SeriesKind::Daily => {
                let precipitation = self
                    .fetch_group(VariableGroup::Precipitation, request, cancel)
                    .await?;
                Ok(merge_records(&precipitation, &[], request.coordinate))
            }
        }
    }
}

impl DataSource for TssAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::NasaTss
    }

    fn fetch<'a>(
        &'a self,
        request: &'a SeriesRequest,
        cancel: &'a CancellationToken,
    ) -> FetchFuture<'a> {
        Box::pin(self.fetch_samples(request, cancel))
    }
}

fn looks_like_html(body: &str) -> bool {
    body.to_ascii_lowercase().contains("<html")
}

#[derive(Debug, Deserialize)]
struct TssResponse {
    data: Vec<Value>,
}

impl TssResponse {
    /// Records that are not JSON objects are dropped.
    fn into_records(self) -> Vec<TssRecord> {
        let total = self.data.len();
        let records = self
            .data
            .into_iter()
            .filter_map(|record| serde_json::from_value::<TssRecord>(record).ok())
            .collect::<Vec<_>>();
        if records.len() < total {
            warn!(dropped = total - records.len(), "skipped malformed time-series records");
        }
        records
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TssRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    time: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    lon: Option<f64>,
    /// mm/h
    #[serde(default, deserialize_with = "lenient_number")]
    apcpsfc: Option<f64>,
    /// K
    #[serde(default, deserialize_with = "lenient_number")]
    tmp2m: Option<f64>,
    /// Pa
    #[serde(default, deserialize_with = "lenient_number")]
    pressfc: Option<f64>,
    /// kg/kg
    #[serde(default, deserialize_with = "lenient_number")]
    spfh2m: Option<f64>,
    #[serde(
        default,
        rename = "SoilMoi0_10cm_inst",
        deserialize_with = "lenient_number"
    )]
    soil_moisture: Option<f64>,
}

#[derive(Debug)]
struct PartialSample {
    lat: f64,
    lon: f64,
    precipitation: Option<f64>,
    soil_moisture: Option<f64>,
    temperature_c: Option<f64>,
    pressure_hpa: Option<f64>,
    specific_humidity: Option<f64>,
}

impl PartialSample {
    fn new(record: &TssRecord, fallback: Coordinate) -> Self {
        Self {
            lat: record.lat.unwrap_or(fallback.lat()),
            lon: record.lon.unwrap_or(fallback.lon()),
            precipitation: None,
            soil_moisture: None,
            temperature_c: None,
            pressure_hpa: None,
            specific_humidity: None,
        }
    }
}

/// Joins the two variable groups on timestamp.
///
/// A timestamp present in only one group keeps the other group's fields
/// absent. Records with unparseable timestamps are dropped. Output is
/// ascending by timestamp.
fn merge_records(
    atmospheric: &[TssRecord],
    soil: &[TssRecord],
    fallback: Coordinate,
) -> Vec<Sample> {
    let mut merged: BTreeMap<UtcDateTime, PartialSample> = BTreeMap::new();
    let mut dropped = 0_usize;

    for record in atmospheric {
        let Some(timestamp) = record.time.as_deref().and_then(parse_timestamp) else {
            dropped += 1;
            continue;
        };
        let partial = merged
            .entry(timestamp)
            .or_insert_with(|| PartialSample::new(record, fallback));
        if let Some(value) = record.apcpsfc {
            partial.precipitation = Some(value);
        }
        if let Some(value) = record.tmp2m {
            partial.temperature_c = Some(kelvin_to_celsius(value));
        }
        if let Some(value) = record.pressfc {
            partial.pressure_hpa = Some(pressure_to_hpa(value));
        }
        if let Some(value) = record.spfh2m {
            partial.specific_humidity = Some(value);
        }
    }

    for record in soil {
        let Some(timestamp) = record.time.as_deref().and_then(parse_timestamp) else {
            dropped += 1;
            continue;
        };
        let partial = merged
            .entry(timestamp)
            .or_insert_with(|| PartialSample::new(record, fallback));
        if let Some(value) = record.soil_moisture {
            partial.soil_moisture = Some(value);
        }
    }

    if dropped > 0 {
        warn!(dropped, "skipped time-series records with missing or unparseable timestamps");
    }

    merged
        .into_iter()
        .map(|(timestamp, partial)| Sample {
            timestamp,
            latitude: partial.lat,
            longitude: partial.lon,
            precipitation_rate: partial.precipitation,
            soil_moisture: partial.soil_moisture,
            temperature: partial.temperature_c,
            relative_humidity: relative_humidity(
                partial.specific_humidity,
                partial.temperature_c,
                partial.pressure_hpa,
            ),
            pressure: partial.pressure_hpa,
        })
        .collect()
}
