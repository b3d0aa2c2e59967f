use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Coordinate, UtcDateTime};

time::serde::format_description!(iso_day, Date, "[year]-[month]-[day]");

/// Which logical series a fetch targets. One fetch per kind may be in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Hourly,
    Daily,
}

impl SeriesKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }
}

impl Display for SeriesKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window presets offered by the consuming screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Quarter,
}

impl TimeRange {
    pub const fn days(self) -> u32 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }

    pub const fn hours(self) -> u32 {
        self.days() * 24
    }
}

/// One instant's measurements at a location, in canonical units.
///
/// Absent fields mean the serving provider had no value; they are never
/// defaulted to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: UtcDateTime,
    pub latitude: f64,
    pub longitude: f64,
    /// mm/h
    pub precipitation_rate: Option<f64>,
    /// m³/m³
    pub soil_moisture: Option<f64>,
    /// °C
    pub temperature: Option<f64>,
    /// %
    pub relative_humidity: Option<f64>,
    /// hPa
    pub pressure: Option<f64>,
}

impl Sample {
    /// Sample with every measurement absent.
    pub fn empty(timestamp: UtcDateTime, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            precipitation_rate: None,
            soil_moisture: None,
            temperature: None,
            relative_humidity: None,
            pressure: None,
        }
    }

    pub fn precipitation_description(&self) -> &'static str {
        precipitation_label(self.precipitation_rate)
    }

    pub fn soil_moisture_description(&self) -> &'static str {
        match self.soil_moisture {
            None => "No data",
            Some(value) if value < 0.15 => "Very dry",
            Some(value) if value < 0.25 => "Dry",
            Some(value) if value < 0.35 => "Normal",
            Some(_) => "Wet",
        }
    }
}

/// Summed precipitation for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    #[serde(with = "iso_day")]
    pub date: Date,
    pub latitude: f64,
    pub longitude: f64,
    /// mm
    pub precipitation: f64,
}

impl DailyAggregate {
    /// Sums hourly precipitation per UTC day. Samples without a precipitation
    /// value do not contribute, and days without contributions are omitted.
    /// Output is ordered by ascending date.
    pub fn from_samples(samples: &[Sample], coordinate: Coordinate) -> Vec<Self> {
        let mut totals: BTreeMap<Date, f64> = BTreeMap::new();
        for sample in samples {
            let Some(rate) = sample.precipitation_rate else {
                continue;
            };
            *totals.entry(sample.timestamp.date()).or_insert(0.0) += rate;
        }

        totals
            .into_iter()
            .map(|(date, precipitation)| Self {
                date,
                latitude: coordinate.lat(),
                longitude: coordinate.lon(),
                precipitation,
            })
            .collect()
    }

    pub fn classify(&self) -> RainClassification {
        RainClassification::from_precipitation(self.date, self.precipitation)
    }

    /// Missing, NaN or negative totals are not trustworthy.
    pub fn is_valid(&self) -> bool {
        !self.precipitation.is_nan() && self.precipitation >= 0.0
    }
}

/// Ordered daily rain tiers in mm/day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RainIntensity {
    None,
    Light,
    Moderate,
    Heavy,
    Extreme,
}

impl RainIntensity {
    /// Inclusive lower bound of the tier.
    pub const fn threshold(self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Light => 0.1,
            Self::Moderate => 2.5,
            Self::Heavy => 10.0,
            Self::Extreme => 25.0,
        }
    }

    pub fn from_precipitation(mm: f64) -> Self {
        if mm < Self::Light.threshold() {
            Self::None
        } else if mm < Self::Moderate.threshold() {
            Self::Light
        } else if mm < Self::Heavy.threshold() {
            Self::Moderate
        } else if mm < Self::Extreme.threshold() {
            Self::Heavy
        } else {
            Self::Extreme
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "No Rain",
            Self::Light => "Light Rain",
            Self::Moderate => "Moderate Rain",
            Self::Heavy => "Heavy Rain",
            Self::Extreme => "Extreme Rain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainClassification {
    #[serde(with = "iso_day")]
    pub date: Date,
    pub precipitation: f64,
    pub is_rainy: bool,
    pub intensity: RainIntensity,
}

impl RainClassification {
    pub fn from_precipitation(date: Date, precipitation: f64) -> Self {
        Self {
            date,
            precipitation,
            is_rainy: precipitation > 0.1,
            intensity: RainIntensity::from_precipitation(precipitation),
        }
    }
}

/// Hourly rate tiers in mm/h.
fn precipitation_label(rate: Option<f64>) -> &'static str {
    match rate {
        None => "No data",
        Some(rate) if rate < 0.1 => "No rain",
        Some(rate) if rate < 2.5 => "Light rain",
        Some(rate) if rate < 7.6 => "Moderate rain",
        Some(_) => "Heavy rain",
    }
}

/// Forecast precipitation for one upcoming hour, in mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPrecipitation {
    pub timestamp: UtcDateTime,
    pub precipitation: f64,
}

impl HourlyPrecipitation {
    pub fn description(&self) -> &'static str {
        precipitation_label(Some(self.precipitation))
    }
}

/// Series published to callers, most recent entry first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entries", rename_all = "snake_case")]
pub enum Series {
    Hourly(Vec<Sample>),
    Daily(Vec<DailyAggregate>),
}

impl Series {
    pub const fn kind(&self) -> SeriesKind {
        match self {
            Self::Hourly(_) => SeriesKind::Hourly,
            Self::Daily(_) => SeriesKind::Daily,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Hourly(samples) => samples.len(),
            Self::Daily(days) => days.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rain tiers for each daily entry; empty for hourly series.
    pub fn rain_classifications(&self) -> Vec<RainClassification> {
        match self {
            Self::Hourly(_) => Vec::new(),
            Self::Daily(days) => days.iter().map(DailyAggregate::classify).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &str, precipitation: Option<f64>) -> Sample {
        let mut sample = Sample::empty(UtcDateTime::parse(ts).expect("valid"), 55.75, 37.62);
        sample.precipitation_rate = precipitation;
        sample
    }

    #[test]
    fn rain_tiers_are_half_open_on_lower_bound() {
        assert_eq!(RainIntensity::from_precipitation(0.0), RainIntensity::None);
        assert_eq!(RainIntensity::from_precipitation(0.099), RainIntensity::None);
        assert_eq!(RainIntensity::from_precipitation(0.1), RainIntensity::Light);
        assert_eq!(RainIntensity::from_precipitation(2.5), RainIntensity::Moderate);
        assert_eq!(RainIntensity::from_precipitation(9.99), RainIntensity::Moderate);
        assert_eq!(RainIntensity::from_precipitation(10.0), RainIntensity::Heavy);
        assert_eq!(RainIntensity::from_precipitation(24.9), RainIntensity::Heavy);
        assert_eq!(RainIntensity::from_precipitation(25.0), RainIntensity::Extreme);
    }

    #[test]
    fn rainy_flag_is_strictly_above_threshold() {
        let date = Date::from_calendar_date(2024, time::Month::May, 1).expect("valid date");
        let boundary = RainClassification::from_precipitation(date, 0.1);
        assert!(!boundary.is_rainy);
        assert_eq!(boundary.intensity, RainIntensity::Light);
        assert!(RainClassification::from_precipitation(date, 0.11).is_rainy);
    }

    #[test]
    fn daily_aggregation_skips_absent_values_and_omits_empty_days() {
        let coordinate = Coordinate::new(55.75, 37.62).expect("valid");
        let samples = vec![
            at("2024-05-01T00:00:00Z", Some(0.5)),
            at("2024-05-01T13:00:00Z", Some(1.25)),
            at("2024-05-01T14:00:00Z", None),
            at("2024-05-02T01:00:00Z", None),
            at("2024-05-03T23:00:00Z", Some(0.0)),
        ];

        let daily = DailyAggregate::from_samples(&samples, coordinate);

        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date.to_string(), "2024-05-01");
        assert!((daily[0].precipitation - 1.75).abs() < 1e-9);
        assert_eq!(daily[1].date.to_string(), "2024-05-03");
        assert_eq!(daily[1].precipitation, 0.0);
    }

    #[test]
    fn descriptions_report_missing_values() {
        let sample = at("2024-05-01T00:00:00Z", None);
        assert_eq!(sample.precipitation_description(), "No data");
        assert_eq!(sample.soil_moisture_description(), "No data");

        let mut wet = at("2024-05-01T00:00:00Z", Some(8.0));
        wet.soil_moisture = Some(0.3);
        assert_eq!(wet.precipitation_description(), "Heavy rain");
        assert_eq!(wet.soil_moisture_description(), "Normal");
    }

    #[test]
    fn daily_entries_serialize_with_iso_dates() {
        let entry = DailyAggregate {
            date: Date::from_calendar_date(2024, time::Month::May, 1).expect("valid date"),
            latitude: 1.0,
            longitude: 2.0,
            precipitation: 3.0,
        };
        let json = serde_json::to_value(&entry).expect("serializable");
        assert_eq!(json["date"], "2024-05-01");
    }

    #[test]
    fn time_range_presets() {
        assert_eq!(TimeRange::Week.days(), 7);
        assert_eq!(TimeRange::Month.hours(), 720);
    }
}
