use async_trait::async_trait;

use super::{Condition, ConditionResult};
use crate::operation::{Operation, OperationError};

/// Inverts another condition's verdict.
///
/// The inner condition's dependency operation is still enqueued: it runs
/// to put the world into a known state, and the negation applies to the
/// evaluation that follows. Wrap in [`SilentCondition`](super::SilentCondition)
/// to suppress it.
#[derive(Debug, Clone)]
pub struct NegatedCondition<C> {
    name: String,
    inner: C,
}

impl<C: Condition> NegatedCondition<C> {
    pub fn new(inner: C) -> Self {
        Self {
            name: format!("Not<{}>", inner.name()),
            inner,
        }
    }
}

#[async_trait]
impl<C: Condition> Condition for NegatedCondition<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_mutually_exclusive(&self) -> bool {
        self.inner.is_mutually_exclusive()
    }

    fn dependency_for_operation(&self, operation: &Operation) -> Option<Operation> {
        self.inner.dependency_for_operation(operation)
    }

    async fn evaluate(&self, operation: &Operation) -> ConditionResult {
        match self.inner.evaluate(operation).await {
            ConditionResult::Satisfied => ConditionResult::Failed(OperationError::condition_failed(
                &self.name,
                format!("Condition '{}' was satisfied", self.inner.name()),
            )),
            ConditionResult::Failed(_) => ConditionResult::Satisfied,
        }
    }
}
