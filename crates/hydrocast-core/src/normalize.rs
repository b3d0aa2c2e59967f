//! Unit and timestamp normalisation shared by every provider adapter.
//!
//! All functions here are pure.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::UtcDateTime;

const KELVIN_OFFSET: f64 = 273.15;

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// Converts a surface pressure of unknown unit to hPa.
///
/// Upstream payloads carry no unit tag, so the unit is guessed from
/// magnitude: below 200 is kPa, above 2000 is Pa, anything else is taken as
/// hPa already. This is an approximation.
pub fn pressure_to_hpa(value: f64) -> f64 {
    if value < 200.0 {
        value * 10.0
    } else if value > 2000.0 {
        value / 100.0
    } else {
        value
    }
}

/// Relative humidity (%) from specific humidity (kg/kg), temperature (°C)
/// and pressure (hPa), clamped to `[0, 100]`.
pub fn relative_humidity(
    specific_humidity: Option<f64>,
    temperature_c: Option<f64>,
    pressure_hpa: Option<f64>,
) -> Option<f64> {
    let (q, t, p) = (specific_humidity?, temperature_c?, pressure_hpa?);

    let vapour_pressure = (q * p) / (0.622 + 0.378 * q);
    let saturation = 6.112 * ((17.67 * t) / (t + 243.5)).exp();
    if saturation.is_nan() || saturation <= 0.0 {
        return None;
    }

    let rh = 100.0 * vapour_pressure / saturation;
    if rh.is_nan() {
        return None;
    }
    Some(rh.clamp(0.0, 100.0))
}

/// Parses a provider timestamp, trying each known encoding in turn.
///
/// Order: RFC3339, `yyyy-MM-ddTHH:mm:ss`, `yyyy-MM-ddTHH:mm`, `yyyy-MM-dd`,
/// `yyyyMMddHH`, `yyyyMMdd:HH`, `yyyy-MM-ddTHH`. Offset-less forms are UTC.
pub fn parse_timestamp(input: &str) -> Option<UtcDateTime> {
    let input = input.trim();

    if let Ok(parsed) = OffsetDateTime::parse(input, &Rfc3339) {
        return Some(UtcDateTime::from_offset_datetime(parsed));
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(
        input,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(utc(parsed));
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(
        input,
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    ) {
        return Some(utc(parsed));
    }
    if let Ok(date) = Date::parse(input, format_description!("[year]-[month]-[day]")) {
        return Some(utc(date.midnight()));
    }
    if let Some(parsed) = parse_compact_hour(input) {
        return Some(parsed);
    }
    if let Some((day, hour)) = input.split_once(':') {
        return parse_day_and_hour(day, hour, format_description!("[year][month][day]"));
    }
    if let Some((day, hour)) = input.split_once('T') {
        return parse_day_and_hour(day, hour, format_description!("[year]-[month]-[day]"));
    }
    None
}

fn parse_compact_hour(input: &str) -> Option<UtcDateTime> {
    if input.len() != 10 || !input.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let (day, hour) = input.split_at(8);
    parse_day_and_hour(day, hour, format_description!("[year][month][day]"))
}

fn parse_day_and_hour(
    day: &str,
    hour: &str,
    day_format: &[time::format_description::BorrowedFormatItem<'_>],
) -> Option<UtcDateTime> {
    if hour.len() != 2 || !hour.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let date = Date::parse(day, day_format).ok()?;
    let hour: u8 = hour.parse().ok()?;
    date.with_hms(hour, 0, 0).ok().map(utc)
}

fn utc(value: PrimitiveDateTime) -> UtcDateTime {
    UtcDateTime::from_offset_datetime(value.assume_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc3339(input: &str) -> String {
        parse_timestamp(input)
            .unwrap_or_else(|| panic!("'{input}' should parse"))
            .format_rfc3339()
    }

    #[test]
    fn converts_kelvin() {
        assert!((kelvin_to_celsius(273.15)).abs() < 1e-9);
        assert!((kelvin_to_celsius(300.0) - 26.85).abs() < 1e-9);
    }

    // The thresholds are a magnitude guess, not an exact unit tag.
    #[test]
    fn pressure_heuristic_is_approximate_by_magnitude() {
        assert!((pressure_to_hpa(101.3) - 1013.0).abs() < 1e-9);
        assert!((pressure_to_hpa(101_325.0) - 1013.25).abs() < 1e-9);
        assert_eq!(pressure_to_hpa(1013.0), 1013.0);
        assert_eq!(pressure_to_hpa(200.0), 200.0);
        assert_eq!(pressure_to_hpa(2000.0), 2000.0);
    }

    #[test]
    fn relative_humidity_matches_reference_values() {
        // 20 °C, 1013.25 hPa, q = 0.0073 kg/kg is close to 50 %.
        let rh = relative_humidity(Some(0.0073), Some(20.0), Some(1013.25)).expect("computable");
        assert!((rh - 50.8).abs() < 1.0, "rh={rh}");
    }

    #[test]
    fn relative_humidity_is_clamped_and_requires_all_inputs() {
        assert_eq!(relative_humidity(Some(0.5), Some(-30.0), Some(1013.0)), Some(100.0));
        assert_eq!(relative_humidity(None, Some(20.0), Some(1013.0)), None);
        assert_eq!(relative_humidity(Some(0.007), None, Some(1013.0)), None);
        assert_eq!(relative_humidity(Some(0.007), Some(20.0), None), None);
    }

    #[test]
    fn relative_humidity_is_none_when_saturation_is_not_positive() {
        // T = -243.5 makes the exponent diverge towards -inf, so es is 0.
        assert_eq!(relative_humidity(Some(0.007), Some(-243.49999), Some(1013.0)), None);
    }

    #[test]
    fn parses_every_known_encoding() {
        assert_eq!(rfc3339("2024-05-01T06:00:00Z"), "2024-05-01T06:00:00Z");
        assert_eq!(rfc3339("2024-05-01T08:00:00+02:00"), "2024-05-01T06:00:00Z");
        assert_eq!(rfc3339("2024-05-01T06:00:00"), "2024-05-01T06:00:00Z");
        assert_eq!(rfc3339("2024-05-01T06:30"), "2024-05-01T06:30:00Z");
        assert_eq!(rfc3339("2024-05-01"), "2024-05-01T00:00:00Z");
        assert_eq!(rfc3339("2024050106"), "2024-05-01T06:00:00Z");
        assert_eq!(rfc3339("20240501:06"), "2024-05-01T06:00:00Z");
        assert_eq!(rfc3339("2024-05-01T06"), "2024-05-01T06:00:00Z");
    }

    #[test]
    fn unparseable_timestamps_yield_none() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-01").is_none());
        assert!(parse_timestamp("2024050125").is_none());
        assert!(parse_timestamp("20240501:6").is_none());
    }
}
