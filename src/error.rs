use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Not signed in: {0}")]
    Auth(String),
    #[error("Prediction service unavailable: {0}")]
    Network(String),
    #[error("Failed to save: {0}")]
    Persistence(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Cannot {action} while at stage {stage}")]
    OutOfOrder { action: &'static str, stage: String },
}

impl AppError {
    /// Whether re-invoking the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Persistence(_))
    }

    /// Failures the workflow may swallow because the user-visible value was already obtained.
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    pub(crate) fn network(e: impl std::fmt::Display) -> Self {
        Self::Network(e.to_string())
    }

    pub(crate) fn persistence(e: impl std::fmt::Display) -> Self {
        Self::Persistence(e.to_string())
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
