//! # Domain Models
//!
//! Canonical, provider-independent types.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Coordinate`] | Validated WGS84 point |
//! | [`Sample`] | One instant's measurements in canonical units |
//! | [`DailyAggregate`] | Summed precipitation for one UTC day |
//! | [`HourlyPrecipitation`] | Forecast precipitation for one upcoming hour |
//! | [`RainClassification`] | Rainy flag and [`RainIntensity`] tier for a day |
//! | [`Series`] | Published hourly or daily series |
//! | [`SeriesKind`] | Logical fetch target |
//! | [`TimeRange`] | Window presets |
//! | [`UtcDateTime`] | UTC instant |
//!
//! Optional measurement fields reflect provider coverage gaps. Nothing in this
//! module turns an absent value into zero.

mod coordinate;
mod models;
mod timestamp;

pub use coordinate::Coordinate;
pub use models::{
    DailyAggregate, HourlyPrecipitation, RainClassification, RainIntensity, Sample, Series,
    SeriesKind, TimeRange,
};
pub use timestamp::UtcDateTime;
