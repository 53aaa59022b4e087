use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info};

use super::{Condition, ConditionResult};
use crate::operation::{Operation, OperationError, WeakOperation, Work};

/// Gate operation that evaluates all of a target's conditions.
///
/// Conditions run concurrently. The evaluator finishes once every condition
/// has reported, with one error per failed condition; the queue cancels the
/// target with those errors before the target can become ready.
pub struct ConditionEvaluator {
    target: WeakOperation,
    conditions: Vec<Arc<dyn Condition>>,
}

impl ConditionEvaluator {
    /// Build the evaluator operation for `target`'s current conditions
    pub fn operation_for(target: &Operation) -> Operation {
        Operation::new(
            format!("{}.condition_evaluator", target.name()),
            Self {
                target: target.downgrade(),
                conditions: target.conditions(),
            },
        )
    }

    /// Evaluate `conditions` against `operation`, returning every failure
    pub async fn evaluate(
        operation: &Operation,
        conditions: &[Arc<dyn Condition>],
    ) -> Vec<OperationError> {
        join_all(
            conditions
                .iter()
                .map(|condition| condition.evaluate(operation)),
        )
        .await
        .into_iter()
        .filter_map(ConditionResult::into_error)
        .collect()
    }
}

#[async_trait]
impl Work for ConditionEvaluator {
    async fn execute(&self, operation: &Operation) {
        let Some(target) = self.target.upgrade() else {
            operation.finish();
            return;
        };

        if target.is_cancelled() || target.state().is_finishing_or_finished() {
            debug!(target = %target.name(), "Skipping condition evaluation for inactive operation");
            operation.finish();
            return;
        }

        target.mark_evaluating_conditions();
        let failures = Self::evaluate(&target, &self.conditions).await;

        if failures.is_empty() {
            debug!(target = %target.name(), conditions = self.conditions.len(), "All conditions satisfied");
        } else {
            info!(
                target = %target.name(),
                failed = failures.len(),
                conditions = self.conditions.len(),
                "❌ CONDITIONS: Operation will not execute"
            );
        }

        operation.finish_with_errors(failures);
    }
}
