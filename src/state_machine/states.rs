use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of an operation, in the order they are entered
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    /// Created, not yet handed to a queue
    #[default]
    Initialized,
    /// Admitted to a queue; waiting on dependencies
    Pending,
    /// The condition evaluator is checking the operation's conditions
    EvaluatingConditions,
    /// Dependencies finished and conditions satisfied
    Ready,
    /// The operation's work is running
    Executing,
    /// A finish variant was called; observers are being notified
    Finishing,
    /// Terminal state
    Finished,
}

impl OperationState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Check if the operation has not started executing yet
    pub fn is_pre_execution(&self) -> bool {
        *self < Self::Executing
    }

    /// Check if one of the finish variants has already been entered
    pub fn is_finishing_or_finished(&self) -> bool {
        *self >= Self::Finishing
    }

    /// Check if this is an active state (operation work is running)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Executing)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Pending => write!(f, "pending"),
            Self::EvaluatingConditions => write!(f, "evaluating_conditions"),
            Self::Ready => write!(f, "ready"),
            Self::Executing => write!(f, "executing"),
            Self::Finishing => write!(f, "finishing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

impl std::str::FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialized" => Ok(Self::Initialized),
            "pending" => Ok(Self::Pending),
            "evaluating_conditions" => Ok(Self::EvaluatingConditions),
            "ready" => Ok(Self::Ready),
            "executing" => Ok(Self::Executing),
            "finishing" => Ok(Self::Finishing),
            "finished" => Ok(Self::Finished),
            _ => Err(format!("Invalid operation state: {s}")),
        }
    }
}
