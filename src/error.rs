//! Error types for the orchestration core.
//!
//! `NotFound`, `InvalidState`, `UnknownTargetType` and `InvalidInput` are
//! caller-addressable conditions. `ConfigurationInvalid` is only ever produced
//! while starting up. Everything else is an opaque internal failure.

use crate::config::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Unsupported target type: {0}")]
    UnknownTargetType(String),
    #[error("Invalid recipe configuration: {0}")]
    ConfigurationInvalid(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Dispatch error: {0}")]
    DispatchError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// HTTP status an API layer should answer with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidState(_) => 409,
            Self::UnknownTargetType(_) | Self::InvalidInput(_) => 400,
            Self::ConfigurationInvalid(_)
            | Self::DatabaseError(_)
            | Self::DispatchError(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Whether the caller can fix the condition by changing the request.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

impl From<sqlx::Error> for OrchestratorError {
    fn from(err: sqlx::Error) -> Self {
        OrchestratorError::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for OrchestratorError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        OrchestratorError::DatabaseError(format!("Migration failed: {err}"))
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::Internal(format!("JSON serialization error: {err}"))
    }
}

impl From<ConfigurationError> for OrchestratorError {
    fn from(err: ConfigurationError) -> Self {
        OrchestratorError::ConfigurationInvalid(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
