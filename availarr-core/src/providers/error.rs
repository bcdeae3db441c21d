use std::time::Duration;

use thiserror::Error;

use crate::timeout::TimedOut;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Not found")]
    NotFound,

    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited
                | ProviderError::NetworkError(_)
                | ProviderError::Timeout { .. }
        )
    }
}

impl TimedOut for ProviderError {
    fn timed_out(operation: &str, after: Duration) -> Self {
        ProviderError::Timeout {
            operation: operation.to_string(),
            after,
        }
    }
}
