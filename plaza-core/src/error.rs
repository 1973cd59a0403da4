use thiserror::Error;

use crate::user::Violations;

/// Common result type for core operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("validation failed: {0}")]
    Validation(Violations),
    /// Login failure. Deliberately carries no detail about which half was wrong.
    #[error("invalid email/password combination")]
    InvalidCredentials,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("other error: {0}")]
    Other(String),
}

impl From<Violations> for ServiceError {
    fn from(violations: Violations) -> Self {
        ServiceError::Validation(violations)
    }
}
