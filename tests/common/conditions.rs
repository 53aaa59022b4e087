use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use opflow::conditions::{Condition, ConditionResult};
use opflow::operation::{Operation, OperationError};
use parking_lot::Mutex;

/// Condition with a fixed verdict that counts its evaluations
pub struct FixedCondition {
    name: String,
    satisfied: bool,
    pub evaluations: Arc<AtomicUsize>,
}

impl FixedCondition {
    pub fn satisfied(name: &str) -> Self {
        Self {
            name: name.to_string(),
            satisfied: true,
            evaluations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            satisfied: false,
            evaluations: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Condition for FixedCondition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, _operation: &Operation) -> ConditionResult {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if self.satisfied {
            ConditionResult::Satisfied
        } else {
            ConditionResult::Failed(OperationError::condition_failed(&self.name, "always fails"))
        }
    }
}

/// Condition that contributes a dependency operation and is satisfied only
/// if that dependency actually ran before evaluation
pub struct RequiresDependency {
    dependency: Mutex<Option<Operation>>,
}

impl RequiresDependency {
    pub fn new(dependency: Operation) -> Self {
        Self {
            dependency: Mutex::new(Some(dependency)),
        }
    }
}

#[async_trait]
impl Condition for RequiresDependency {
    fn name(&self) -> &str {
        "RequiresDependency"
    }

    fn dependency_for_operation(&self, _operation: &Operation) -> Option<Operation> {
        self.dependency.lock().clone()
    }

    async fn evaluate(&self, _operation: &Operation) -> ConditionResult {
        let finished = self
            .dependency
            .lock()
            .as_ref()
            .is_some_and(Operation::is_finished);
        if finished {
            ConditionResult::Satisfied
        } else {
            ConditionResult::Failed(OperationError::condition_failed(
                "RequiresDependency",
                "dependency has not finished",
            ))
        }
    }
}
