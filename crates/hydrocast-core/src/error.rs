use thiserror::Error;

use crate::domain::SeriesKind;

/// Validation errors for caller-supplied query parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("coordinate component '{field}' must be finite")]
    NonFiniteCoordinate { field: &'static str },
    #[error("latitude {value} is outside [-90, 90]")]
    LatitudeOutOfRange { value: f64 },
    #[error("longitude {value} is outside [-180, 180]")]
    LongitudeOutOfRange { value: f64 },

    #[error("window must cover at least one day")]
    EmptyWindow,
    #[error("window of {days} days exceeds max {max}")]
    WindowTooLong { days: u32, max: u32 },

    #[error("timestamp is not in any recognised encoding: '{value}'")]
    UnrecognisedTimestamp { value: String },
}

/// Failure of a single provider attempt.
///
/// `Display` is safe to surface in logs at `warn`; body samples are only
/// reachable through [`ProviderError::body_sample`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("no request url could be built")]
    UrlBuildFailure,

    #[error("provider rejected the credential")]
    Unauthorized,

    #[error("invalid response: {message}")]
    InvalidResponse {
        message: String,
        body_sample: Option<String>,
    },

    #[error("payload could not be decoded: {message}")]
    DecodingFailure { message: String },

    #[error("network failure: {cause}")]
    NetworkFailure { cause: String },

    #[error("all {attempted} candidate urls failed; last error: {last}")]
    AllCandidatesFailed {
        attempted: usize,
        last: Box<ProviderError>,
    },

    #[error("request was cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn invalid_response(message: impl Into<String>, body: &str) -> Self {
        Self::InvalidResponse {
            message: message.into(),
            body_sample: body_sample(body),
        }
    }

    pub fn decoding(message: impl Into<String>) -> Self {
        Self::DecodingFailure {
            message: message.into(),
        }
    }

    pub fn network(cause: impl Into<String>) -> Self {
        Self::NetworkFailure {
            cause: cause.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UrlBuildFailure | Self::Unauthorized | Self::Cancelled => false,
            Self::AllCandidatesFailed { last, .. } => last.is_retryable(),
            Self::InvalidResponse { .. } | Self::DecodingFailure { .. } | Self::NetworkFailure { .. } => {
                true
            }
        }
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn body_sample(&self) -> Option<&str> {
        match self {
            Self::InvalidResponse { body_sample, .. } => body_sample.as_deref(),
            Self::AllCandidatesFailed { last, .. } => last.body_sample(),
            _ => None,
        }
    }
}

pub(crate) const BODY_SAMPLE_CHARS: usize = 300;

/// First characters of a response body, kept for diagnostics.
pub(crate) fn body_sample(body: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    Some(body.chars().take(BODY_SAMPLE_CHARS).collect())
}

/// Error surfaced to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to load {kind} series from every provider")]
    Exhausted {
        kind: SeriesKind,
        #[source]
        source: ProviderError,
    },

    #[error("failed to load the precipitation forecast")]
    Forecast(#[source] ProviderError),

    #[error("fetch was superseded by a newer request")]
    Cancelled,
}

impl FetchError {
    /// Single human-readable line for the presentation layer.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(error) => format!("Invalid request: {error}."),
            Self::Exhausted { kind, source } => format!(
                "Failed to load {kind} data from the primary, secondary and archive providers ({}).",
                source_summary(source)
            ),
            Self::Forecast(source) => format!(
                "Failed to load the precipitation forecast ({}).",
                source_summary(source)
            ),
            Self::Cancelled => String::from("Request cancelled."),
        }
    }
}

fn source_summary(error: &ProviderError) -> &'static str {
    match error {
        ProviderError::UrlBuildFailure => "request could not be built",
        ProviderError::Unauthorized => "access denied",
        ProviderError::InvalidResponse { .. } => "unexpected response",
        ProviderError::DecodingFailure { .. } => "unreadable data",
        ProviderError::NetworkFailure { .. } => "network unavailable",
        ProviderError::AllCandidatesFailed { last, .. } => source_summary(last),
        ProviderError::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_and_cancelled_are_not_retryable() {
        assert!(!ProviderError::Unauthorized.is_retryable());
        assert!(!ProviderError::Cancelled.is_retryable());
        assert!(!ProviderError::UrlBuildFailure.is_retryable());
        assert!(ProviderError::network("reset").is_retryable());
    }

    #[test]
    fn exhausted_candidates_inherit_retryability_from_last_error() {
        let denied = ProviderError::AllCandidatesFailed {
            attempted: 4,
            last: Box::new(ProviderError::Unauthorized),
        };
        let flaky = ProviderError::AllCandidatesFailed {
            attempted: 4,
            last: Box::new(ProviderError::invalid_response("HTTP 500", "oops")),
        };

        assert!(!denied.is_retryable());
        assert!(flaky.is_retryable());
        assert_eq!(flaky.body_sample(), Some("oops"));
    }

    #[test]
    fn display_never_leaks_body_sample() {
        let error = ProviderError::invalid_response("HTTP 502", "<secret upstream page>");
        assert_eq!(error.to_string(), "invalid response: HTTP 502");
    }

    #[test]
    fn body_sample_is_truncated() {
        let body = "x".repeat(1_000);
        let sample = body_sample(&body).expect("non-empty body has a sample");
        assert_eq!(sample.chars().count(), 300);
        assert_eq!(body_sample(""), None);
    }

    #[test]
    fn user_message_is_single_line_without_diagnostics() {
        let error = FetchError::Exhausted {
            kind: SeriesKind::Daily,
            source: ProviderError::invalid_response("HTTP 500 from https://x", "trace"),
        };

        let message = error.user_message();
        assert!(message.contains("daily"));
        assert!(!message.contains("https://"));
        assert!(!message.contains('\n'));
    }

    #[test]
    fn forecast_failure_names_the_outlook() {
        let error = FetchError::Forecast(ProviderError::network("connection reset"));

        assert_eq!(
            error.user_message(),
            "Failed to load the precipitation forecast (network unavailable)."
        );
    }
}
