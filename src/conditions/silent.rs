use async_trait::async_trait;

use super::{Condition, ConditionResult};
use crate::operation::Operation;

/// Wraps a condition so that it never enqueues its dependency operation.
///
/// Name, exclusivity and evaluation are the inner condition's. Useful to
/// check a permission without prompting for it.
#[derive(Debug, Clone)]
pub struct SilentCondition<C> {
    inner: C,
}

impl<C: Condition> SilentCondition<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: Condition> Condition for SilentCondition<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_mutually_exclusive(&self) -> bool {
        self.inner.is_mutually_exclusive()
    }

    fn dependency_for_operation(&self, _operation: &Operation) -> Option<Operation> {
        None
    }

    async fn evaluate(&self, operation: &Operation) -> ConditionResult {
        self.inner.evaluate(operation).await
    }
}
