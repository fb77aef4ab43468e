//! crates/classroom_core/src/error.rs
//!
//! The error taxonomy shared by every store operation, whichever ingress path
//! (request/response or persistent connection) the mutation arrived on.

use crate::ports::PortError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// No usable credential was presented.
    #[error("Unauthorized")]
    Unauthenticated,

    /// The caller's role or ownership does not permit the operation.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate pending lecture or duplicate question text.
    #[error("{0}")]
    Conflict(String),

    /// The state machine does not allow the requested move.
    #[error("{0}")]
    InvalidTransition(String),

    /// Store or broadcast failure. The message is for logs only.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PortError> for ServiceError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => ServiceError::NotFound(msg),
            PortError::Conflict(msg) => ServiceError::Conflict(msg),
            PortError::Unauthorized => ServiceError::Unauthenticated,
            PortError::Unexpected(msg) => ServiceError::Internal(msg),
            PortError::Stale(msg) => ServiceError::InvalidTransition(msg),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
