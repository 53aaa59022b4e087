use async_trait::async_trait;

use super::{Condition, ConditionResult};
use crate::operation::{Operation, OperationError};

pub const NO_CANCELLED_DEPENDENCIES: &str = "NoCancelledDependencies";

/// Fails if any of the operation's dependencies was cancelled.
///
/// Dependencies unblock their dependents however they finish; attach this
/// to opt out of running after a cancelled predecessor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCancelledDependencies;

#[async_trait]
impl Condition for NoCancelledDependencies {
    fn name(&self) -> &str {
        NO_CANCELLED_DEPENDENCIES
    }

    async fn evaluate(&self, operation: &Operation) -> ConditionResult {
        let cancelled: Vec<String> = operation
            .dependencies()
            .iter()
            .filter(|dependency| dependency.is_cancelled())
            .map(|dependency| dependency.name().to_string())
            .collect();

        if cancelled.is_empty() {
            ConditionResult::Satisfied
        } else {
            ConditionResult::Failed(OperationError::condition_failed(
                NO_CANCELLED_DEPENDENCIES,
                format!("Cancelled dependencies: {}", cancelled.join(", ")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fails_on_cancelled_dependency() {
        let op = Operation::empty("op");
        let fine = Operation::empty("fine");
        op.add_dependency(&fine);
        assert!(NoCancelledDependencies.evaluate(&op).await.is_satisfied());

        let cancelled = Operation::empty("cancelled");
        cancelled.cancel();
        op.add_dependency(&cancelled);

        let error = NoCancelledDependencies.evaluate(&op).await.into_error().unwrap();
        assert_eq!(
            error,
            OperationError::condition_failed(
                NO_CANCELLED_DEPENDENCIES,
                "Cancelled dependencies: cancelled"
            )
        );
    }
}
