//! Error types for the client.

use crate::api_client::ApiClientError;
use crate::config::ConfigError;
use alien_core::{AccessError, PortalError, ValidationError};
use alien_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<AccessError> for ClientError {
    fn from(err: AccessError) -> Self {
        Self::Portal(PortalError::from(err))
    }
}

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        Self::Portal(PortalError::from(err))
    }
}

impl ClientError {
    /// True when the server rejected the session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Api(ApiClientError::Unauthorized { .. }))
    }

    /// True for role failures, whether caught locally or by the server.
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            ClientError::Api(ApiClientError::Forbidden { .. })
                | ClientError::Portal(PortalError::Access(AccessError::Forbidden { .. }))
        )
    }

    /// The message the server sent with a rejection, if there was one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Api(
                ApiClientError::Unauthorized { message }
                | ApiClientError::Forbidden { message }
                | ApiClientError::Status { message, .. },
            ) => Some(message),
            _ => None,
        }
    }

    /// Text suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
