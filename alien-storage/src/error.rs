//! Storage errors.

use alien_core::PortalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt value under {key}: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for PortalError {
    fn from(err: StorageError) -> Self {
        PortalError::storage(err.to_string())
    }
}
