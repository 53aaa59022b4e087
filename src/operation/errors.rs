use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error records accumulated by an operation.
///
/// Errors are data: they are collected into ordered lists on the operation
/// and handed to observers and queue delegates when it finishes.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationError {
    /// A condition attached to the operation evaluated to failed
    #[error("Condition '{condition}' failed: {reason}")]
    ConditionFailed { condition: String, reason: String },

    /// Reported by the operation's own work
    #[error("Execution failed: {message}")]
    Execution { message: String },

    /// A timeout observer cancelled the operation
    #[error("Operation timed out after {after:?}")]
    TimedOut { after: Duration },

    /// Several errors reported as one, e.g. by a group operation
    #[error("{} errors occurred: [{}]", .errors.len(), join_messages(.errors))]
    Composite { errors: Vec<OperationError> },
}

fn join_messages(errors: &[OperationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl OperationError {
    pub fn condition_failed(condition: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConditionFailed {
            condition: condition.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Collapse an error list: `None` when empty, the error itself when
    /// there is exactly one, a `Composite` otherwise.
    pub fn from_errors(mut errors: Vec<OperationError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Composite { errors }),
        }
    }

    /// Name of the failed condition, if this is a condition failure
    pub fn condition_name(&self) -> Option<&str> {
        match self {
            Self::ConditionFailed { condition, .. } => Some(condition),
            _ => None,
        }
    }

    pub fn is_condition_failure(&self) -> bool {
        matches!(self, Self::ConditionFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_errors_collapses() {
        assert_eq!(OperationError::from_errors(vec![]), None);

        let single = OperationError::execution("boom");
        assert_eq!(
            OperationError::from_errors(vec![single.clone()]),
            Some(single)
        );

        let composite = OperationError::from_errors(vec![
            OperationError::execution("a"),
            OperationError::condition_failed("Reachable", "offline"),
        ])
        .unwrap();
        match &composite {
            OperationError::Composite { errors } => assert_eq!(errors.len(), 2),
            other => panic!("Expected composite error, got {other:?}"),
        }
        assert_eq!(
            composite.to_string(),
            "2 errors occurred: [Execution failed: a; Condition 'Reachable' failed: offline]"
        );
    }

    #[test]
    fn test_condition_name() {
        let err = OperationError::condition_failed("MutuallyExclusive<Alert>", "busy");
        assert_eq!(err.condition_name(), Some("MutuallyExclusive<Alert>"));
        assert!(err.is_condition_failure());
        assert_eq!(OperationError::execution("x").condition_name(), None);
    }

    #[test]
    fn test_error_serde() {
        let err = OperationError::condition_failed("Silent", "denied");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "condition_failed");
        assert_eq!(json["condition"], "Silent");
    }
}
