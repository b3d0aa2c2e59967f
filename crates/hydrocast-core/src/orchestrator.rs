//! Fallback-chain fetch orchestration.
//!
//! One [`Orchestrator`] owns the provider chain, the primary provider's
//! circuit breaker, the result caches and the in-flight fetch tokens. Build a
//! fresh one per test; nothing here is process-global.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use time::Date;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{ForecastAdapter, OpenMeteoAdapter, PowerAdapter, TssAdapter};
use crate::cache::{QueryKey, ResultCache};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{validate_window, OrchestratorConfig};
use crate::data_source::{DataSource, SeriesRequest};
use crate::http_client::{HttpClient, ReqwestHttpClient, SharedCredential};
use crate::retry::RetryPolicy;
use crate::{
    Coordinate, DailyAggregate, FetchError, HourlyPrecipitation, ProviderError, ProviderId,
    Sample, Series, SeriesKind, UtcDateTime,
};

/// A successfully served series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    /// Most recent entry first.
    pub series: Series,
    pub source: ProviderId,
    /// Degraded-mode notice when a fallback provider served the data.
    pub notice: Option<String>,
    pub from_cache: bool,
}

/// Latest published state for one series kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesState {
    pub series: Option<Series>,
    pub loading: bool,
    /// Human-readable failure of the last completed fetch.
    pub error: Option<String>,
    pub notice: Option<String>,
    pub source: Option<ProviderId>,
}

#[derive(Debug, Default)]
struct InFlight {
    next_generation: u64,
    tokens: HashMap<SeriesKind, (u64, CancellationToken)>,
}

struct OrchestratorInner {
    config: OrchestratorConfig,
    primary: Arc<dyn DataSource>,
    secondary: Arc<dyn DataSource>,
    tertiary: Arc<dyn DataSource>,
    forecast: ForecastAdapter,
    breaker: CircuitBreaker,
    cache: ResultCache<FetchOutcome>,
    credential: SharedCredential,
    in_flight: Mutex<InFlight>,
    hourly_state: watch::Sender<SeriesState>,
    daily_state: watch::Sender<SeriesState>,
    clock: fn() -> UtcDateTime,
}

/// Fetch orchestrator. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    /// Sets or clears the bearer token sent to the primary provider. Applies
    /// from the next request on.
    pub fn set_credential(&self, token: Option<String>) {
        info!(present = token.is_some(), "primary provider credential updated");
        self.inner.credential.set(token);
    }

    pub fn subscribe(&self, kind: SeriesKind) -> watch::Receiver<SeriesState> {
        self.state_sender(kind).subscribe()
    }

    /// Current published state for `kind`.
    pub fn state(&self, kind: SeriesKind) -> SeriesState {
        self.state_sender(kind).borrow().clone()
    }

    pub async fn fetch_hourly(
        &self,
        coordinate: Coordinate,
        days: u32,
    ) -> Result<FetchOutcome, FetchError> {
        self.fetch(coordinate, days, SeriesKind::Hourly).await
    }

    pub async fn fetch_daily(
        &self,
        coordinate: Coordinate,
        days: u32,
    ) -> Result<FetchOutcome, FetchError> {
        self.fetch(coordinate, days, SeriesKind::Daily).await
    }

    /// Precipitation for the next 24 hours, ascending. Uncached and outside
    /// the fallback chain; retried with the archive provider's budget.
    pub async fn fetch_precipitation_forecast(
        &self,
        coordinate: Coordinate,
    ) -> Result<Vec<HourlyPrecipitation>, FetchError> {
        let inner = &self.inner;
        let now = (inner.clock)();
        let cancel = CancellationToken::new();

        let hours = inner
            .config
            .tertiary_retry
            .run(&cancel, || inner.forecast.fetch(coordinate, now, &cancel))
            .await
            .map_err(|error| {
                warn!(error = %error, "precipitation forecast failed");
                FetchError::Forecast(error)
            })?;
        info!(hours = hours.len(), "precipitation forecast served");
        Ok(hours)
    }

    /// Starts a fetch on the runtime and returns immediately. Results reach
    /// subscribers of `kind`; the handle yields the same result.
    pub fn fetch_series(
        &self,
        coordinate: Coordinate,
        days: u32,
        kind: SeriesKind,
    ) -> JoinHandle<Result<FetchOutcome, FetchError>> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.fetch(coordinate, days, kind).await })
    }

    /// Runs one fetch for `kind`, cancelling any fetch of the same kind that
    /// is still in flight, and publishes the result.
    pub async fn fetch(
        &self,
        coordinate: Coordinate,
        days: u32,
        kind: SeriesKind,
    ) -> Result<FetchOutcome, FetchError> {
        let days = match validate_window(days) {
            Ok(days) => days,
            Err(error) => {
                let error = FetchError::from(error);
                self.publish_failure(kind, &error);
                return Err(error);
            }
        };

        let (generation, cancel) = self.begin(kind);
        let result = self.run(coordinate, days, kind, &cancel).await;
        self.finish(kind, generation);

        match &result {
            Ok(outcome) => self.publish_success(outcome),
            Err(FetchError::Cancelled) => debug!(%kind, "fetch superseded, nothing published"),
            Err(error) => self.publish_failure(kind, error),
        }
        result
    }

    async fn run(
        &self,
        coordinate: Coordinate,
        days: u32,
        kind: SeriesKind,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let inner = &self.inner;
        let key = QueryKey::new(coordinate, days, kind);

        if let Some(mut hit) = inner.cache.get(&key).await {
            debug!(%key, "cache hit");
            hit.from_cache = true;
            return Ok(hit);
        }
        self.publish_loading(kind);

        let now = (inner.clock)();
        let request = SeriesRequest::trailing(coordinate, days, kind, now);
        let mut last_error = None;

        if inner.breaker.allow_request() {
            match self
                .call(inner.primary.as_ref(), inner.config.primary_retry, &request, cancel)
                .await
            {
                Ok(samples) => {
                    if cancel.is_cancelled() {
                        return Err(FetchError::Cancelled);
                    }
                    inner.breaker.record_success();
                    return self.complete(key, &request, samples, inner.primary.id(), cancel).await;
                }
                Err(error) => {
                    if error.is_cancelled() || cancel.is_cancelled() {
                        return Err(FetchError::Cancelled);
                    }
                    warn!(provider = %inner.primary.id(), %kind, error = %error, "primary provider failed");
                    inner.breaker.record_failure();
                    last_error = Some(error);
                }
            }
        } else {
            info!(
                remaining_secs = inner.breaker.remaining_open().map_or(0, |left| left.as_secs()),
                "primary provider circuit open, skipping"
            );
        }

        for (source, policy) in [
            (&inner.secondary, inner.config.secondary_retry),
            (&inner.tertiary, inner.config.tertiary_retry),
        ] {
            match self.call(source.as_ref(), policy, &request, cancel).await {
                Ok(samples) => {
                    if cancel.is_cancelled() {
                        return Err(FetchError::Cancelled);
                    }
                    return self.complete(key, &request, samples, source.id(), cancel).await;
                }
                Err(error) => {
                    if error.is_cancelled() || cancel.is_cancelled() {
                        return Err(FetchError::Cancelled);
                    }
                    warn!(provider = %source.id(), %kind, error = %error, "fallback provider failed");
                    last_error = Some(error);
                }
            }
        }

        Err(FetchError::Exhausted {
            kind,
            source: last_error.unwrap_or(ProviderError::Cancelled),
        })
    }

    async fn call(
        &self,
        source: &dyn DataSource,
        policy: RetryPolicy,
        request: &SeriesRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Sample>, ProviderError> {
        debug!(provider = %source.id(), kind = %request.kind, "calling provider");
        policy.run(cancel, || source.fetch(request, cancel)).await
    }

    /// Shapes provider samples into the published series and caches it.
    async fn complete(
        &self,
        key: QueryKey,
        request: &SeriesRequest,
        mut samples: Vec<Sample>,
        source: ProviderId,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let series = match request.kind {
            SeriesKind::Hourly => {
                samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                Series::Hourly(samples)
            }
            SeriesKind::Daily => {
                let mut daily = DailyAggregate::from_samples(&samples, request.coordinate);
                if source != ProviderId::OpenMeteo {
                    daily = self.gap_fill(daily, request, cancel).await;
                }
                if cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
                daily.sort_by(|a, b| b.date.cmp(&a.date));
                Series::Daily(daily)
            }
        };

        let outcome = FetchOutcome {
            notice: degraded_notice(source, request.kind),
            series,
            source,
            from_cache: false,
        };
        self.inner.cache.put(key, outcome.clone()).await;
        info!(
            provider = %source,
            kind = %request.kind,
            entries = outcome.series.len(),
            "series served"
        );
        Ok(outcome)
    }

    /// Re-fetches the most recent days from the archive provider and patches
    /// days that are missing or invalid. A failed patch keeps `daily` as is.
    async fn gap_fill(
        &self,
        daily: Vec<DailyAggregate>,
        request: &SeriesRequest,
        cancel: &CancellationToken,
    ) -> Vec<DailyAggregate> {
        let inner = &self.inner;
        let days = inner.config.gap_fill_days;
        if days == 0 {
            return daily;
        }

        let patch_request =
            SeriesRequest::trailing(request.coordinate, days, SeriesKind::Daily, request.end);
        match self
            .call(inner.tertiary.as_ref(), inner.config.gap_fill_retry, &patch_request, cancel)
            .await
        {
            Ok(samples) => {
                let patch = DailyAggregate::from_samples(&samples, request.coordinate);
                patch_recent_days(daily, &patch, request.end.date(), days)
            }
            Err(error) => {
                if !error.is_cancelled() {
                    warn!(error = %error, "gap-fill failed, publishing unpatched aggregate");
                }
                daily
            }
        }
    }

    fn begin(&self, kind: SeriesKind) -> (u64, CancellationToken) {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        in_flight.next_generation += 1;
        let generation = in_flight.next_generation;
        let token = CancellationToken::new();

        if let Some((_, previous)) = in_flight.tokens.insert(kind, (generation, token.clone())) {
            debug!(%kind, "cancelling in-flight fetch");
            previous.cancel();
        }
        (generation, token)
    }

    fn finish(&self, kind: SeriesKind, generation: u64) {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(in_flight.tokens.get(&kind), Some((current, _)) if *current == generation) {
            in_flight.tokens.remove(&kind);
        }
    }

    fn state_sender(&self, kind: SeriesKind) -> &watch::Sender<SeriesState> {
        match kind {
            SeriesKind::Hourly => &self.inner.hourly_state,
            SeriesKind::Daily => &self.inner.daily_state,
        }
    }

    fn publish_loading(&self, kind: SeriesKind) {
        self.state_sender(kind).send_modify(|state| {
            state.loading = true;
            state.error = None;
            state.notice = None;
        });
    }

    fn publish_success(&self, outcome: &FetchOutcome) {
        self.state_sender(outcome.series.kind()).send_modify(|state| {
            state.series = Some(outcome.series.clone());
            state.loading = false;
            state.error = None;
            state.notice = outcome.notice.clone();
            state.source = Some(outcome.source);
        });
    }

    fn publish_failure(&self, kind: SeriesKind, error: &FetchError) {
        let message = error.user_message();
        self.state_sender(kind).send_modify(|state| {
            state.loading = false;
            state.error = Some(message);
            state.notice = None;
        });
    }
}

fn degraded_notice(source: ProviderId, kind: SeriesKind) -> Option<String> {
    let headline = match source {
        ProviderId::NasaTss => return None,
        ProviderId::NasaPower => "Using NASA POWER open API (time-series service unavailable).",
        ProviderId::OpenMeteo => "Using Open-Meteo ERA5 (NASA endpoints unavailable).",
    };
    Some(match kind {
        SeriesKind::Hourly => format!("{headline} Soil moisture not available."),
        SeriesKind::Daily => headline.to_owned(),
    })
}

/// Replaces days in `[today - (days - 1), today]` that are absent, NaN or
/// negative in `base` with the matching day from `patch`. Other days are left
/// untouched. Output is ascending by date.
pub(crate) fn patch_recent_days(
    base: Vec<DailyAggregate>,
    patch: &[DailyAggregate],
    today: Date,
    days: u32,
) -> Vec<DailyAggregate> {
    let first = today
        .checked_sub(time::Duration::days(i64::from(days.saturating_sub(1))))
        .unwrap_or(today);
    let mut by_day = base
        .into_iter()
        .map(|entry| (entry.date, entry))
        .collect::<BTreeMap<_, _>>();

    let mut patched = 0_usize;
    for fallback in patch {
        if fallback.date < first || fallback.date > today {
            continue;
        }
        let needs_patch = by_day
            .get(&fallback.date)
            .map_or(true, |current| !current.is_valid());
        if needs_patch {
            by_day.insert(fallback.date, fallback.clone());
            patched += 1;
        }
    }
    if patched > 0 {
        debug!(patched, "gap-filled recent days");
    }

    by_day.into_values().collect()
}

/// Builder for an [`Orchestrator`] wired to the three providers.
///
/// ```rust,ignore
/// use hydrocast_core::OrchestratorBuilder;
///
/// let orchestrator = OrchestratorBuilder::new()
///     .with_config(OrchestratorConfig::from_env())
///     .with_real_client()
///     .build();
/// ```
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    http_client: Option<Arc<dyn HttpClient>>,
    primary_endpoints: Option<Vec<String>>,
    clock: fn() -> UtcDateTime,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            http_client: None,
            primary_endpoints: None,
            clock: UtcDateTime::now,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Transport shared by all three providers.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_real_client(mut self) -> Self {
        self.http_client = Some(Arc::new(ReqwestHttpClient::new(&self.config.user_agent)));
        self
    }

    pub fn with_credential(mut self, token: impl Into<String>) -> Self {
        self.config.credential = Some(token.into());
        self
    }

    /// Replaces the primary provider's candidate base URLs.
    pub fn with_primary_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.primary_endpoints = Some(endpoints);
        self
    }

    pub fn with_clock(mut self, clock: fn() -> UtcDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Orchestrator {
        let config = self.config;
        let http_client = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new(&config.user_agent)));
        let credential = SharedCredential::new(config.credential.clone());

        let mut primary = TssAdapter::new(Arc::clone(&http_client), credential.clone())
            .with_timeout(config.http_timeout)
            .with_user_agent(config.user_agent.as_str());
        if let Some(endpoints) = self.primary_endpoints {
            primary = primary.with_base_candidates(endpoints);
        }
        let secondary = PowerAdapter::new(Arc::clone(&http_client))
            .with_timeout(config.http_timeout)
            .with_user_agent(config.user_agent.as_str());
        let tertiary = OpenMeteoAdapter::new(Arc::clone(&http_client))
            .with_timeout(config.http_timeout)
            .with_user_agent(config.user_agent.as_str());
        let forecast = ForecastAdapter::new(http_client)
            .with_timeout(config.http_timeout)
            .with_user_agent(config.user_agent.as_str());

        debug!(
            credential = credential.is_set(),
            cache_ttl_secs = config.cache_ttl.as_secs(),
            "orchestrator built"
        );

        Orchestrator {
            inner: Arc::new(OrchestratorInner {
                breaker: CircuitBreaker::new(config.breaker),
                cache: ResultCache::new(config.cache_ttl),
                primary: Arc::new(primary),
                secondary: Arc::new(secondary),
                tertiary: Arc::new(tertiary),
                forecast,
                credential,
                in_flight: Mutex::new(InFlight::default()),
                hourly_state: watch::Sender::new(SeriesState::default()),
                daily_state: watch::Sender::new(SeriesState::default()),
                clock: self.clock,
                config,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn day(date: Date, precipitation: f64) -> DailyAggregate {
        DailyAggregate {
            date,
            latitude: 55.75,
            longitude: 37.62,
            precipitation,
        }
    }

    #[test]
    fn patches_only_invalid_or_missing_recent_days() {
        let base = vec![
            day(date!(2024 - 05 - 04), -1.0),
            day(date!(2024 - 05 - 06), 2.0),
            day(date!(2024 - 05 - 07), f64::NAN),
        ];
        let patch = vec![
            day(date!(2024 - 05 - 04), 9.0),
            day(date!(2024 - 05 - 06), 9.0),
            day(date!(2024 - 05 - 07), 1.5),
            day(date!(2024 - 05 - 08), 0.4),
        ];

        let patched = patch_recent_days(base, &patch, date!(2024 - 05 - 08), 3);

        let values = patched
            .iter()
            .map(|entry| (entry.date, entry.precipitation))
            .collect::<Vec<_>>();
        assert_eq!(
            values,
            vec![
                // Outside the three-day window, left alone even though invalid.
                (date!(2024 - 05 - 04), -1.0),
                (date!(2024 - 05 - 06), 2.0),
                (date!(2024 - 05 - 07), 1.5),
                (date!(2024 - 05 - 08), 0.4),
            ]
        );
    }

    #[test]
    fn invalid_day_without_patch_value_is_kept() {
        let base = vec![day(date!(2024 - 05 - 08), -3.0)];

        let patched = patch_recent_days(base, &[], date!(2024 - 05 - 08), 3);

        assert_eq!(patched.len(), 1);
        assert_eq!(patched[0].precipitation, -3.0);
    }

    #[test]
    fn notices_name_the_serving_provider() {
        assert_eq!(degraded_notice(ProviderId::NasaTss, SeriesKind::Hourly), None);

        let hourly = degraded_notice(ProviderId::NasaPower, SeriesKind::Hourly).expect("degraded");
        assert!(hourly.contains("NASA POWER"));
        assert!(hourly.contains("Soil moisture not available"));

        let daily = degraded_notice(ProviderId::OpenMeteo, SeriesKind::Daily).expect("degraded");
        assert!(daily.contains("Open-Meteo"));
        assert!(!daily.contains("Soil moisture"));
    }

    #[tokio::test]
    async fn invalid_window_is_rejected_and_published() {
        let orchestrator = OrchestratorBuilder::new()
            .with_http_client(Arc::new(crate::http_client::ScriptedHttpClient::new()))
            .build();
        let coordinate = Coordinate::new(55.75, 37.62).expect("valid");

        let error = orchestrator
            .fetch_daily(coordinate, 0)
            .await
            .expect_err("empty window");

        assert!(matches!(error, FetchError::Validation(_)));
        let state = orchestrator.state(SeriesKind::Daily);
        assert!(state.error.is_some());
        assert!(!state.loading);
    }

    #[test]
    fn loading_clears_the_previous_failure_and_notice() {
        let orchestrator = OrchestratorBuilder::new()
            .with_http_client(Arc::new(crate::http_client::ScriptedHttpClient::new()))
            .build();
        orchestrator.state_sender(SeriesKind::Daily).send_modify(|state| {
            state.error = Some(String::from("Failed to load daily data."));
            state.notice = Some(String::from("degraded"));
        });

        orchestrator.publish_loading(SeriesKind::Daily);

        let state = orchestrator.state(SeriesKind::Daily);
        assert!(state.loading);
        assert_eq!(state.error, None);
        assert_eq!(state.notice, None);
    }

    #[test]
    fn begin_cancels_previous_token_of_same_kind_only() {
        let orchestrator = OrchestratorBuilder::new()
            .with_http_client(Arc::new(crate::http_client::ScriptedHttpClient::new()))
            .build();

        let (first_generation, first) = orchestrator.begin(SeriesKind::Hourly);
        let (_, daily) = orchestrator.begin(SeriesKind::Daily);
        let (second_generation, second) = orchestrator.begin(SeriesKind::Hourly);

        assert!(first.is_cancelled());
        assert!(!daily.is_cancelled());
        assert!(!second.is_cancelled());

        // A stale finish must not drop the newer token.
        orchestrator.finish(SeriesKind::Hourly, first_generation);
        let (_, third) = orchestrator.begin(SeriesKind::Hourly);
        assert!(second.is_cancelled());
        assert!(!third.is_cancelled());
        orchestrator.finish(SeriesKind::Hourly, second_generation);
    }
}
