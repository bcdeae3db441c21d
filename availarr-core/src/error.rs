use thiserror::Error;

use crate::providers::ProviderError;
use crate::sources::SourceError;

#[derive(Error, Debug)]
pub enum AvailarrError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AvailarrError {
    /// Worth retrying on the next scheduled pass.
    pub fn is_transient(&self) -> bool {
        match self {
            AvailarrError::Provider(err) => err.is_transient(),
            AvailarrError::Source(err) => err.is_transient(),
            #[cfg(feature = "database")]
            AvailarrError::Database(_) => true,
            _ => false,
        }
    }
}

impl From<availarr_model::ModelError> for AvailarrError {
    fn from(err: availarr_model::ModelError) -> Self {
        AvailarrError::InvalidData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AvailarrError>;
