use serde::{Deserialize, Serialize};

/// Events that can trigger operation state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationEvent {
    /// The queue announced its intent to schedule the operation
    Enqueue,
    /// The condition evaluator started checking the operation's conditions
    EvaluateConditions,
    /// Every dependency finished and no condition failed
    BecomeReady,
    /// The executor invoked the operation's work
    Start,
    /// One of the finish variants was called
    BeginFinishing,
    /// Observers have been told, the operation is done
    Finish,
}

impl OperationEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Enqueue => "enqueue",
            Self::EvaluateConditions => "evaluate_conditions",
            Self::BecomeReady => "become_ready",
            Self::Start => "start",
            Self::BeginFinishing => "begin_finishing",
            Self::Finish => "finish",
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish)
    }
}
