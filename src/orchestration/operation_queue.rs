//! # Operation Queue
//!
//! Submission point for operations. On top of running operations on the Tokio
//! runtime once their dependencies finish, admission:
//!
//! - enqueues the dependency operations contributed by conditions
//! - registers mutually exclusive operations with the exclusivity controller
//!   and makes them depend on their predecessors
//! - gates the operation behind a condition evaluator
//! - reports lifecycle events to an optional [`QueueDelegate`]

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::exclusivity_controller::ExclusivityController;
use crate::conditions::ConditionEvaluator;
use crate::config::QueueConfig;
use crate::error::{OpflowError, Result};
use crate::operation::{BlockObserver, Operation, OperationError, OperationObserver};

/// Receives lifecycle events for every operation admitted to a queue.
///
/// Held weakly by the queue.
pub trait QueueDelegate: Send + Sync + 'static {
    fn will_add_operation(&self, _queue: &OperationQueue, _operation: &Operation) {}

    fn operation_did_finish(
        &self,
        _queue: &OperationQueue,
        _operation: &Operation,
        _errors: &[OperationError],
    ) {
    }
}

/// Cloneable handle to an operation queue
#[derive(Clone)]
pub struct OperationQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    name: String,
    exclusivity: Arc<ExclusivityController>,
    delegate: RwLock<Option<Weak<dyn QueueDelegate>>>,
    suspended: watch::Sender<bool>,
    limiter: Option<Arc<Semaphore>>,
    operations: DashMap<Uuid, Operation>,
}

/// Observer the queue attaches to every operation it admits
struct QueueObserver {
    queue: Weak<QueueInner>,
    exclusivity: Arc<ExclusivityController>,
    categories: Vec<String>,
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationQueue {
    /// Queue with default settings and the process-wide exclusivity controller
    pub fn new() -> Self {
        Self::with_exclusivity(ExclusivityController::shared())
    }

    /// Queue with default settings and an explicit exclusivity controller
    pub fn with_exclusivity(exclusivity: Arc<ExclusivityController>) -> Self {
        Self::with_config(QueueConfig::default(), exclusivity)
    }

    pub fn with_config(config: QueueConfig, exclusivity: Arc<ExclusivityController>) -> Self {
        let (suspended, _) = watch::channel(config.start_suspended);
        let limiter = config
            .max_concurrent_operations
            .map(|permits| Arc::new(Semaphore::new(permits.max(1))));

        Self {
            inner: Arc::new(QueueInner {
                name: config.name,
                exclusivity,
                delegate: RwLock::new(None),
                suspended,
                limiter,
                operations: DashMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn exclusivity(&self) -> &Arc<ExclusivityController> {
        &self.inner.exclusivity
    }

    /// Install a delegate. The queue keeps only a weak reference.
    pub fn set_delegate<D: QueueDelegate>(&self, delegate: &Arc<D>) {
        let delegate: Weak<D> = Arc::downgrade(delegate);
        let delegate: Weak<dyn QueueDelegate> = delegate;
        *self.inner.delegate.write() = Some(delegate);
    }

    pub fn clear_delegate(&self) {
        *self.inner.delegate.write() = None;
    }

    /// Pause or resume starting operations. Operations already executing
    /// are not affected.
    pub fn set_suspended(&self, suspended: bool) {
        let previous = self.inner.suspended.send_replace(suspended);
        if previous != suspended {
            debug!(queue = %self.inner.name, suspended, "Queue suspension changed");
        }
    }

    pub fn is_suspended(&self) -> bool {
        *self.inner.suspended.borrow()
    }

    /// Operations admitted and not yet finished, condition evaluators included
    pub fn operations(&self) -> Vec<Operation> {
        self.inner
            .operations
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn operation_count(&self) -> usize {
        self.inner.operations.len()
    }

    pub fn cancel_all_operations(&self) {
        let operations = self.operations();
        info!(queue = %self.inner.name, count = operations.len(), "🛑 QUEUE: Cancelling all operations");
        for operation in operations {
            operation.cancel();
        }
    }

    /// Admit an operation.
    ///
    /// Must be called from within a Tokio runtime. Fails if the operation was
    /// already admitted to a queue.
    #[instrument(skip(self, operation), fields(queue = %self.inner.name, operation = %operation.name()))]
    pub fn add_operation(&self, operation: Operation) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| OpflowError::NoRuntime)?;

        operation.will_enqueue()?;

        // Dependencies contributed by conditions go through the full pipeline
        let conditions = operation.conditions();
        for condition in &conditions {
            let Some(dependency) = condition.dependency_for_operation(&operation) else {
                continue;
            };
            debug!(
                condition = condition.name(),
                dependency = %dependency.name(),
                "Condition contributed a dependency"
            );
            operation.add_dependency(&dependency);
            if let Err(e) = self.add_operation(dependency) {
                warn!(condition = condition.name(), error = %e, "Condition dependency was not admitted");
            }
        }

        // Mutual exclusivity: the category is the condition's name
        let categories: Vec<String> = conditions
            .iter()
            .filter(|condition| condition.is_mutually_exclusive())
            .map(|condition| condition.name().to_string())
            .collect();
        if !categories.is_empty() {
            for predecessor in self.inner.exclusivity.add_operation(&operation, &categories) {
                operation.add_dependency(&predecessor);
            }
        }

        if !conditions.is_empty() {
            let evaluator = self.condition_evaluator_for(&operation)?;
            operation.add_dependency(&evaluator);
            self.inner.schedule(&runtime, evaluator);
        }

        operation.add_observer(QueueObserver {
            queue: Arc::downgrade(&self.inner),
            exclusivity: Arc::clone(&self.inner.exclusivity),
            categories,
        });

        if let Some(delegate) = self.inner.delegate() {
            delegate.will_add_operation(self, &operation);
        }

        debug!(
            dependencies = operation.dependencies().len(),
            conditions = conditions.len(),
            "📥 QUEUE: Operation admitted"
        );
        self.inner.schedule(&runtime, operation);
        Ok(())
    }

    /// Admit several operations, optionally waiting until all of them have
    /// finished. Waiting suspends the calling task only.
    pub async fn add_operations(
        &self,
        operations: Vec<Operation>,
        wait_until_finished: bool,
    ) -> Result<()> {
        for operation in &operations {
            self.add_operation(operation.clone())?;
        }

        if wait_until_finished {
            join_all(operations.iter().map(Operation::wait_until_finished)).await;
        }
        Ok(())
    }

    /// Wait until every admitted operation, including ones admitted while
    /// waiting, has finished
    pub async fn wait_until_all_operations_are_finished(&self) {
        loop {
            let pending: Vec<Operation> = self
                .operations()
                .into_iter()
                .filter(|operation| !operation.is_finished())
                .collect();
            if pending.is_empty() {
                return;
            }
            join_all(pending.iter().map(Operation::wait_until_finished)).await;
        }
    }

    /// Evaluator for `operation`'s conditions. It runs after every
    /// dependency known so far and cancels the operation if any condition
    /// fails, or if the evaluator itself is cancelled.
    fn condition_evaluator_for(&self, operation: &Operation) -> Result<Operation> {
        let evaluator = ConditionEvaluator::operation_for(operation);
        for dependency in operation.dependencies() {
            evaluator.add_dependency(&dependency);
        }

        let target = operation.downgrade();
        evaluator.add_observer(BlockObserver::new().on_finish(move |evaluator, errors| {
            // A cancelled evaluator may never have evaluated the conditions
            if errors.is_empty() && !evaluator.is_cancelled() {
                return;
            }
            if let Some(target) = target.upgrade() {
                target.cancel_with_errors(errors.to_vec());
            }
        }));

        evaluator.will_enqueue()?;
        Ok(evaluator)
    }
}

impl QueueInner {
    fn delegate(&self) -> Option<Arc<dyn QueueDelegate>> {
        self.delegate.read().as_ref().and_then(Weak::upgrade)
    }

    /// Hand the operation to the runtime
    fn schedule(self: &Arc<Self>, runtime: &Handle, operation: Operation) {
        self.operations.insert(operation.id(), operation.clone());
        let queue = Arc::clone(self);
        runtime.spawn(async move { queue.drive(operation).await });
    }

    async fn drive(self: Arc<Self>, operation: Operation) {
        self.wait_until_resumed().await;
        operation.wait_until_ready().await;

        let _permit = match &self.limiter {
            Some(limiter) => Arc::clone(limiter).acquire_owned().await.ok(),
            None => None,
        };
        // Suspension may have changed while waiting
        self.wait_until_resumed().await;

        operation.start().await;
        operation.wait_until_finished().await;
        self.operations.remove(&operation.id());
    }

    async fn wait_until_resumed(&self) {
        let mut suspended = self.suspended.subscribe();
        let _ = suspended.wait_for(|suspended| !*suspended).await;
    }
}

impl OperationObserver for QueueObserver {
    fn operation_did_produce(&self, operation: &Operation, produced: &Operation) {
        let Some(inner) = self.queue.upgrade() else {
            warn!(operation = %operation.name(), "Queue gone, dropping produced operation");
            return;
        };
        let queue = OperationQueue { inner };
        if let Err(e) = queue.add_operation(produced.clone()) {
            warn!(
                operation = %operation.name(),
                produced = %produced.name(),
                error = %e,
                "Produced operation was not admitted"
            );
        }
    }

    fn operation_did_finish(&self, operation: &Operation, errors: &[OperationError]) {
        if !self.categories.is_empty() {
            self.exclusivity.remove_operation(operation, &self.categories);
        }

        let Some(inner) = self.queue.upgrade() else {
            return;
        };
        if let Some(delegate) = inner.delegate() {
            let queue = OperationQueue { inner };
            delegate.operation_did_finish(&queue, operation, errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::OperationState;

    #[test]
    fn test_admission_requires_runtime() {
        let queue = OperationQueue::with_exclusivity(Arc::new(ExclusivityController::new()));
        let op = Operation::empty("outside");
        assert!(matches!(queue.add_operation(op.clone()), Err(OpflowError::NoRuntime)));
        assert_eq!(op.state(), OperationState::Initialized);
    }

    #[tokio::test]
    async fn test_double_admission_is_rejected() {
        let queue = OperationQueue::with_exclusivity(Arc::new(ExclusivityController::new()));
        queue.set_suspended(true);
        let op = Operation::empty("twice");
        queue.add_operation(op.clone()).unwrap();
        assert!(matches!(
            queue.add_operation(op.clone()),
            Err(OpflowError::StateTransition(_))
        ));
        assert_eq!(queue.operation_count(), 1);
    }

    #[tokio::test]
    async fn test_suspended_queue_holds_operations() {
        let queue = OperationQueue::with_config(
            QueueConfig {
                start_suspended: true,
                ..QueueConfig::named("held")
            },
            Arc::new(ExclusivityController::new()),
        );
        assert!(queue.is_suspended());

        let op = Operation::empty("held");
        queue.add_operation(op.clone()).unwrap();
        tokio::task::yield_now().await;
        assert!(!op.is_finished());

        queue.set_suspended(false);
        assert!(op.wait_until_finished().await.is_empty());
        queue.wait_until_all_operations_are_finished().await;
    }
}
