use super::{
    errors::{StateMachineError, StateMachineResult},
    events::OperationEvent,
    states::OperationState,
};

/// Lifecycle state machine owned by a single operation
///
/// Not synchronized on its own; the owning operation guards it with its lock.
#[derive(Debug, Clone, Default)]
pub struct OperationStateMachine {
    state: OperationState,
}

impl OperationStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state of the operation
    pub fn current_state(&self) -> OperationState {
        self.state
    }

    /// Attempt to transition the operation state
    pub fn transition(&mut self, event: OperationEvent) -> StateMachineResult<OperationState> {
        let target = Self::determine_target_state(self.state, event)?;
        self.state = target;
        Ok(target)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: OperationState,
        event: OperationEvent,
    ) -> StateMachineResult<OperationState> {
        use OperationState as S;

        let target = match (current_state, event) {
            (S::Initialized, OperationEvent::Enqueue) => S::Pending,

            (S::Pending, OperationEvent::EvaluateConditions) => S::EvaluatingConditions,
            (S::Pending | S::EvaluatingConditions, OperationEvent::BecomeReady) => S::Ready,

            (S::Ready, OperationEvent::Start) => S::Executing,

            // Cancelled operations finish straight from a pre-execution state
            (from, OperationEvent::BeginFinishing) if !from.is_finishing_or_finished() => {
                S::Finishing
            }
            (S::Finishing, OperationEvent::Finish) => S::Finished,

            (from, event) => return Err(StateMachineError::InvalidTransition { from, event }),
        };

        Ok(target)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
