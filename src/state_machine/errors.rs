use thiserror::Error;

use super::events::OperationEvent;
use super::states::OperationState;

/// Errors raised by illegal lifecycle transitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} on event '{}'", .event.event_type())]
    InvalidTransition {
        from: OperationState,
        event: OperationEvent,
    },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
