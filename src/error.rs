use thiserror::Error;

use crate::lifecycle::TransitionError;
use crate::store::RepositoryError;

/// Errors surfaced by workflow operations. All of them are recoverable by the caller.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("forbidden: {action}: {reason}")]
    Forbidden { action: String, reason: String },

    #[error("{subject} transition rejected: cannot move from {from} to {to}; allowed: {{{}}}", .allowed.join(", "))]
    InvalidTransition {
        subject: &'static str,
        from: String,
        to: String,
        allowed: Vec<String>,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        WorkflowError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(action: impl Into<String>, reason: impl Into<String>) -> Self {
        WorkflowError::Forbidden {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name of the error family
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::NotFound { .. } => "NOT_FOUND",
            WorkflowError::Forbidden { .. } => "FORBIDDEN",
            WorkflowError::InvalidTransition { .. } => "INVALID_TRANSITION",
            WorkflowError::InvalidState(_) => "INVALID_STATE",
            WorkflowError::InvalidInput(_) => "INVALID_INPUT",
            WorkflowError::Repository(_) => "REPOSITORY",
        }
    }
}

impl From<TransitionError> for WorkflowError {
    fn from(err: TransitionError) -> Self {
        WorkflowError::InvalidTransition {
            subject: err.subject,
            from: err.from,
            to: err.to,
            allowed: err.allowed,
        }
    }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
