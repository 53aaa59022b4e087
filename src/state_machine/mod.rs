// State machine module for the operation lifecycle
//
// Operations advance monotonically through their lifecycle. Cancellation is an
// orthogonal flag tracked by the operation itself, not a state.

pub mod errors;
pub mod events;
pub mod operation_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::OperationEvent;
pub use operation_state_machine::OperationStateMachine;
pub use states::OperationState;
