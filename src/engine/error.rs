// ABOUTME: Error types for the staged workflow engine
// ABOUTME: Separates fatal engine errors from stage errors that are only recorded in stage logs

use thiserror::Error;

use crate::advice::AdviceError;
use crate::providers::ProviderError;

/// Fatal to a run; returned from `process` after provider teardown
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input record {ticket_id}: {reason}")]
    InvalidInput { ticket_id: String, reason: String },

    #[error("Failed to read tickets from {path}: {message}")]
    InputFile { path: String, message: String },

    #[error("Provider registry could not be built: {0}")]
    Registry(#[from] ProviderError),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Recorded in a stage log, never propagated past the engine
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Ability '{capability}' on {provider_id} failed: {message}")]
    AbilityFailed {
        capability: String,
        provider_id: String,
        message: String,
    },

    #[error("Ability '{capability}' returned an unusable result: {reason}")]
    InvalidResult { capability: String, reason: String },

    #[error("Advice request failed: {0}")]
    Advice(#[from] AdviceError),

    #[error("Run cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("{}", join_errors(.0))]
    Multiple(Vec<StageError>),
}

fn join_errors(errors: &[StageError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl StageError {
    /// Collapse a list of errors into one, `None` when the list is empty
    pub fn combine(mut errors: Vec<StageError>) -> Option<StageError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(StageError::Multiple(errors)),
        }
    }

    pub fn is_cancellation(&self) -> bool {
        match self {
            StageError::Cancelled { .. } => true,
            StageError::Multiple(errors) => errors.iter().any(|e| e.is_cancellation()),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
