//! Errors surfaced by a turn

use parley_providers::ProviderError;
use thiserror::Error;

/// Why a turn produced no reply.
///
/// Either way the caller's session is left as it was.
#[derive(Error, Debug)]
pub enum TurnError {
    /// Credentials, endpoint or provider selection are missing or wrong
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider call failed or returned something unusable
    #[error("Provider error: {0}")]
    Provider(ProviderError),
}

impl From<ProviderError> for TurnError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::ConfigError(message) => TurnError::Configuration(message),
            other => TurnError::Provider(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_split_out() {
        let err: TurnError = ProviderError::ConfigError("no key".into()).into();
        assert!(matches!(err, TurnError::Configuration(_)));

        let err: TurnError = ProviderError::ApiError("HTTP 500".into()).into();
        assert!(matches!(err, TurnError::Provider(_)));
        assert_eq!(err.to_string(), "Provider error: API error: HTTP 500");
    }
}
