use thiserror::Error;

use crate::state_machine::StateMachineError;

/// Crate-level error for misuse of the engine and its configuration.
///
/// Failures of the operations themselves are never reported through this
/// type; they travel as [`OperationError`](crate::operation::OperationError)
/// lists handed to observers and queue delegates.
#[derive(Debug, Error)]
pub enum OpflowError {
    #[error("State transition error: {0}")]
    StateTransition(#[from] StateMachineError),

    #[error("Operations can only be admitted from within a Tokio runtime")]
    NoRuntime,

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, OpflowError>;
