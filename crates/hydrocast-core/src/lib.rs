//! # Hydrocast Core
//!
//! Fetch orchestration for historical hydrological and meteorological point
//! time series.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Canonical domain models** for hourly samples and daily precipitation
//! - **Provider adapters** for the NASA hydrology time-series service, NASA
//!   POWER and the Open-Meteo ERA5 archive
//! - **Retry policy** with exponential backoff and jitter
//! - **Circuit breaker** guarding the primary provider
//! - **TTL cache** keyed by rounded coordinate, window and series kind
//! - **Orchestrator** running the fallback chain, cancel-previous and the
//!   daily gap-fill pass
//! - **Precipitation outlook** for the next 24 hours from the Open-Meteo
//!   forecast API
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (NASA TSS, NASA POWER, Open-Meteo, forecast) |
//! | [`cache`] | TTL result cache |
//! | [`circuit_breaker`] | Consecutive-failure breaker |
//! | [`config`] | Orchestrator settings and environment overrides |
//! | [`data_source`] | Provider trait and request type |
//! | [`domain`] | Domain models (Sample, DailyAggregate, Series) |
//! | [`error`] | Error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`normalize`] | Unit conversion and timestamp parsing |
//! | [`orchestrator`] | Fallback chain and publication |
//! | [`retry`] | Retry policy |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hydrocast_core::{Coordinate, OrchestratorBuilder, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = OrchestratorBuilder::new()
//!         .with_config(OrchestratorConfig::from_env())
//!         .with_real_client()
//!         .build();
//!
//!     let coordinate = Coordinate::new(55.75, 37.62)?;
//!     let outcome = orchestrator.fetch_daily(coordinate, 7).await?;
//!
//!     for day in outcome.series.rain_classifications() {
//!         println!("{} {:.1} mm {}", day.date, day.precipitation, day.intensity.label());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Orchestrator   │────▶│ Cache / Breaker  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest/script) │
//! └─────────────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Domain Models   │
//! │ (Sample, Daily) │
//! └─────────────────┘
//! ```
//!
//! ## Security
//!
//! - The bearer credential comes from the environment or `set_credential` and
//!   is never logged
//! - Response body samples only appear in `debug` logs, never in user messages

pub mod adapters;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod normalize;
pub mod orchestrator;
pub mod retry;

pub use adapters::{ForecastAdapter, OpenMeteoAdapter, PowerAdapter, TssAdapter};
pub use cache::{QueryKey, ResultCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{OrchestratorConfig, MAX_WINDOW_DAYS};
pub use data_source::{DataSource, ProviderId, SeriesRequest};
pub use domain::{
    Coordinate, DailyAggregate, HourlyPrecipitation, RainClassification, RainIntensity, Sample,
    Series, SeriesKind, TimeRange, UtcDateTime,
};
pub use error::{FetchError, ProviderError, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient, SharedCredential,
};
pub use orchestrator::{FetchOutcome, Orchestrator, OrchestratorBuilder, SeriesState};
pub use retry::RetryPolicy;
