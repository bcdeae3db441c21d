use std::time::Duration;

use thiserror::Error;

use crate::timeout::TimedOut;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid source configuration: {0}")]
    Config(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Network(_) | SourceError::Timeout { .. } => true,
            SourceError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl TimedOut for SourceError {
    fn timed_out(operation: &str, after: Duration) -> Self {
        SourceError::Timeout {
            operation: operation.to_string(),
            after,
        }
    }
}
