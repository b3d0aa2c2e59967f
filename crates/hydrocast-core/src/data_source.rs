//! Provider contract shared by the three upstream adapters.
//!
//! | Provider | Role | Adapter |
//! |----------|------|---------|
//! | [`ProviderId::NasaTss`] | primary | [`crate::adapters::TssAdapter`] |
//! | [`ProviderId::NasaPower`] | secondary | [`crate::adapters::PowerAdapter`] |
//! | [`ProviderId::OpenMeteo`] | tertiary, gap-fill | [`crate::adapters::OpenMeteoAdapter`] |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{Coordinate, ProviderError, Sample, SeriesKind, UtcDateTime};

/// Canonical provider identifiers used in logs and published state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    NasaTss,
    NasaPower,
    OpenMeteo,
}

impl ProviderId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NasaTss => "nasa_tss",
            Self::NasaPower => "nasa_power",
            Self::OpenMeteo => "open_meteo",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::NasaTss => "NASA Hydrology time series",
            Self::NasaPower => "NASA POWER",
            Self::OpenMeteo => "Open-Meteo ERA5",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time window and target of one provider call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesRequest {
    pub coordinate: Coordinate,
    pub start: UtcDateTime,
    pub end: UtcDateTime,
    pub kind: SeriesKind,
}

impl SeriesRequest {
    /// Window ending at `now` truncated to the whole hour and spanning `days`.
    pub fn trailing(coordinate: Coordinate, days: u32, kind: SeriesKind, now: UtcDateTime) -> Self {
        let end = now.truncated_to_hour();
        Self {
            coordinate,
            start: end.minus_days(days),
            end,
            kind,
        }
    }
}

pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Sample>, ProviderError>> + Send + 'a>>;

/// One upstream provider: a single request/response cycle decoded into
/// canonical samples, ascending by timestamp.
pub trait DataSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn fetch<'a>(&'a self, request: &'a SeriesRequest, cancel: &'a CancellationToken)
        -> FetchFuture<'a>;
}
