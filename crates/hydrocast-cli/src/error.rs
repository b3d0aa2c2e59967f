use thiserror::Error;

use hydrocast_core::FetchError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] hydrocast_core::ValidationError),

    #[error("{}", .0.user_message())]
    Fetch(FetchError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<FetchError> for CliError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Validation(error) => Self::Validation(error),
            other => Self::Fetch(other),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Fetch(_) => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrocast_core::{ProviderError, SeriesKind, ValidationError};

    #[test]
    fn validation_inside_fetch_error_keeps_its_exit_code() {
        let error = CliError::from(FetchError::Validation(ValidationError::EmptyWindow));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn exhausted_fetch_prints_user_message() {
        let error = CliError::from(FetchError::Exhausted {
            kind: SeriesKind::Hourly,
            source: ProviderError::network("connection reset"),
        });

        assert_eq!(error.exit_code(), 3);
        assert!(error.to_string().contains("hourly"));
        assert!(!error.to_string().contains("connection reset"));
    }
}
