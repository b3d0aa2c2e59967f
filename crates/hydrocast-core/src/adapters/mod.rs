pub mod forecast;
pub mod open_meteo;
pub mod power;
pub mod tss;

pub use forecast::ForecastAdapter;
pub use open_meteo::OpenMeteoAdapter;
pub use power::PowerAdapter;
pub use tss::TssAdapter;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::http_client::{HttpError, HttpResponse};
use crate::{ProviderError, ProviderId};

fn transport_error(provider: ProviderId, error: HttpError) -> ProviderError {
    debug!(%provider, timeout = error.is_timeout(), error = %error, "transport failure");
    ProviderError::network(error.message())
}

/// Maps a non-2xx status to `InvalidResponse` carrying a body sample.
fn ensure_success(provider: ProviderId, response: &HttpResponse) -> Result<(), ProviderError> {
    if response.is_success() {
        return Ok(());
    }
    let error = ProviderError::invalid_response(
        format!("{} HTTP {}", provider.as_str(), response.status),
        &response.body,
    );
    debug!(
        %provider,
        status = response.status,
        sample = error.body_sample().unwrap_or_default(),
        "non-success status"
    );
    Err(error)
}

fn decode<T: serde::de::DeserializeOwned>(
    provider: ProviderId,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| {
        debug!(
            %provider,
            sample = %body.chars().take(crate::error::BODY_SAMPLE_CHARS).collect::<String>(),
            "payload decoding failed"
        );
        ProviderError::decoding(format!("{}: {e}", provider.as_str()))
    })
}

/// Finite JSON number, otherwise absent.
fn number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|value| value.is_finite())
}

/// Field deserializer that turns nulls, strings and other non-numeric input
/// into `None` instead of failing the payload.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number))
}

/// Like [`lenient_number`] for text fields such as timestamps.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Ok(Some(text)),
        _ => Ok(None),
    }
}
