pub mod identity;
pub mod notify;
pub mod repository;

pub use identity::{Caller, Role};
pub use notify::{LogDispatcher, NotificationDispatcher};
pub use repository::{RepoError, RepoResult, WriteOutcome};

/// Error taxonomy shared by every service in the workspace.
///
/// `Internal` carries the underlying detail for logging only; the HTTP layer
/// never echoes it back to callers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {}", .0.join("; "))]
    Conflict(Vec<String>),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Cannot {action} while {from}")]
    InvalidStateTransition {
        from: String,
        action: String,
    },
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        CoreError::Internal(err.to_string())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        CoreError::Conflict(vec![reason.into()])
    }

    pub fn invalid_transition(from: impl std::fmt::Display, action: &str) -> Self {
        CoreError::InvalidStateTransition {
            from: from.to_string(),
            action: action.to_string(),
        }
    }

    /// Stable class name surfaced to callers.
    pub fn class(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "ValidationError",
            CoreError::Auth(_) => "AuthError",
            CoreError::Forbidden(_) => "ForbiddenError",
            CoreError::Conflict(_) => "ConflictError",
            CoreError::NotFound(_) => "NotFoundError",
            CoreError::InvalidStateTransition { .. } => "InvalidStateTransition",
            CoreError::Internal(_) => "InternalError",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
