//! Error types for portal operations

use crate::identity::Role;
use thiserror::Error;

/// Access control errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("No active session")]
    NotAuthenticated,

    #[error("Role {role} may not {action}")]
    Forbidden { role: Role, action: String },

    #[error("Project {id} is not visible to this user")]
    NotVisible { id: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown sort kind: {kind}")]
    UnknownSortKind { kind: String },
}

/// Master error type for all portal errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortalError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Fetch failed: {reason}")]
    Fetch { reason: String },

    #[error("Storage failed: {reason}")]
    Storage { reason: String },
}

/// Result type alias for portal operations.
pub type PortalResult<T> = Result<T, PortalError>;

impl PortalError {
    pub fn fetch(reason: impl Into<String>) -> Self {
        Self::Fetch {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }
}
