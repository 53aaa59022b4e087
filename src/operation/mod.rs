//! # Operations
//!
//! An [`Operation`] is a cheaply cloneable handle to a unit of asynchronous
//! work with a lifecycle state machine, attached conditions and observers,
//! dependencies, and an accumulated error list.
//!
//! Behaviour is injected through the [`Work`] trait rather than subclassing:
//! a block operation, the condition evaluator and the group operation are all
//! plain operations parameterized by different work.
//!
//! ## Lifecycle
//!
//! ```text
//! Initialized -> Pending -> [EvaluatingConditions] -> Ready -> Executing -> Finishing -> Finished
//! ```
//!
//! Cancellation is a flag, not a state. A cancelled operation that has not
//! started is driven to `Finished` by its queue without executing; an executing
//! one is expected to notice the flag and finish on its own.

pub mod errors;
pub mod observer;
pub mod work;

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::conditions::Condition;
use crate::state_machine::{OperationEvent, OperationState, OperationStateMachine, StateMachineResult};

pub use errors::OperationError;
pub use observer::{BlockObserver, OperationObserver, TimeoutObserver};
pub use work::{BlockWork, EmptyWork, Work};

/// Handle to a schedulable unit of asynchronous work.
///
/// Clones share the same underlying operation; equality and hashing use the
/// operation's identity.
#[derive(Clone)]
pub struct Operation {
    inner: Arc<OperationInner>,
}

/// Non-owning handle, used wherever a reference back to an operation must not
/// keep it alive.
#[derive(Clone)]
pub struct WeakOperation {
    inner: Weak<OperationInner>,
}

struct OperationInner {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    work: Arc<dyn Work>,
    core: Mutex<OperationCore>,
    cancelled: watch::Sender<bool>,
    finished: watch::Sender<bool>,
}

#[derive(Default)]
struct OperationCore {
    machine: OperationStateMachine,
    conditions: Vec<Arc<dyn Condition>>,
    observers: Vec<Arc<dyn OperationObserver>>,
    dependencies: Vec<Operation>,
    errors: Vec<OperationError>,
    finished_at: Option<DateTime<Utc>>,
}

/// Point-in-time, serializable view of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub id: Uuid,
    pub name: String,
    pub state: OperationState,
    pub cancelled: bool,
    pub conditions: Vec<String>,
    pub dependency_count: usize,
    pub errors: Vec<OperationError>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Operation {
    /// Create an operation that runs `work` when executed
    pub fn new<W: Work>(name: impl Into<String>, work: W) -> Self {
        let (cancelled, _) = watch::channel(false);
        let (finished, _) = watch::channel(false);

        Self {
            inner: Arc::new(OperationInner {
                id: Uuid::new_v4(),
                name: name.into(),
                created_at: Utc::now(),
                work: Arc::new(work),
                core: Mutex::new(OperationCore::default()),
                cancelled,
                finished,
            }),
        }
    }

    /// Create an operation from an async block.
    ///
    /// The block receives the operation handle (to check cancellation or
    /// produce further operations) and the operation finishes with the
    /// block's error, if any, as soon as the returned future completes.
    pub fn block<F, Fut>(name: impl Into<String>, block: F) -> Self
    where
        F: FnOnce(Operation) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), OperationError>> + Send + 'static,
    {
        Self::new(name, BlockWork::new(block))
    }

    /// Create an operation that finishes as soon as it executes
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, EmptyWork)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> OperationState {
        self.inner.core.lock().machine.current_state()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.borrow()
    }

    pub fn is_finished(&self) -> bool {
        *self.inner.finished.borrow()
    }

    pub fn is_executing(&self) -> bool {
        self.state().is_active()
    }

    pub fn downgrade(&self) -> WeakOperation {
        WeakOperation {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Attach a condition. Only allowed before the operation is enqueued.
    pub fn add_condition<C: Condition>(&self, condition: C) {
        self.add_shared_condition(Arc::new(condition));
    }

    pub fn add_shared_condition(&self, condition: Arc<dyn Condition>) {
        let mut core = self.inner.core.lock();
        if core.machine.current_state() != OperationState::Initialized {
            warn!(
                operation = %self.inner.name,
                condition = condition.name(),
                state = %core.machine.current_state(),
                "Ignoring condition added after the operation was enqueued"
            );
            return;
        }
        core.conditions.push(condition);
    }

    pub fn conditions(&self) -> Vec<Arc<dyn Condition>> {
        self.inner.core.lock().conditions.clone()
    }

    /// Attach an observer. Only allowed before the operation starts finishing.
    pub fn add_observer<O: OperationObserver>(&self, observer: O) {
        self.add_shared_observer(Arc::new(observer));
    }

    pub fn add_shared_observer(&self, observer: Arc<dyn OperationObserver>) {
        let mut core = self.inner.core.lock();
        if core.machine.current_state().is_finishing_or_finished() {
            warn!(
                operation = %self.inner.name,
                "Ignoring observer added to a finishing operation"
            );
            return;
        }
        core.observers.push(observer);
    }

    /// Make this operation wait for `dependency` to finish before it may
    /// become ready. Ignored once the operation is ready.
    pub fn add_dependency(&self, dependency: &Operation) {
        self.try_add_dependency(dependency);
    }

    /// Same as [`add_dependency`](Self::add_dependency), returning whether
    /// this operation will wait for `dependency`. The readiness check and the
    /// insertion happen under one lock.
    pub fn try_add_dependency(&self, dependency: &Operation) -> bool {
        if dependency == self {
            warn!(operation = %self.inner.name, "Ignoring self dependency");
            return false;
        }

        let mut core = self.inner.core.lock();
        let state = core.machine.current_state();
        if state >= OperationState::Ready {
            warn!(
                operation = %self.inner.name,
                dependency = %dependency.name(),
                state = %state,
                "Ignoring dependency added after the operation became ready"
            );
            return false;
        }
        if !core.dependencies.contains(dependency) {
            core.dependencies.push(dependency.clone());
        }
        true
    }

    pub fn remove_dependency(&self, dependency: &Operation) {
        self.inner
            .core
            .lock()
            .dependencies
            .retain(|existing| existing != dependency);
    }

    pub fn dependencies(&self) -> Vec<Operation> {
        self.inner.core.lock().dependencies.clone()
    }

    /// Errors accumulated so far; the full list once finished
    pub fn errors(&self) -> Vec<OperationError> {
        self.inner.core.lock().errors.clone()
    }

    /// Signal that a queue is about to schedule this operation
    pub fn will_enqueue(&self) -> StateMachineResult<()> {
        self.transition(OperationEvent::Enqueue).map(|_| ())
    }

    pub fn cancel(&self) {
        self.cancel_with_errors(Vec::new());
    }

    pub fn cancel_with_error(&self, error: OperationError) {
        self.cancel_with_errors(vec![error]);
    }

    /// Mark the operation cancelled, recording `errors`.
    ///
    /// Does not finish the operation by itself.
    pub fn cancel_with_errors(&self, errors: Vec<OperationError>) {
        let newly_cancelled = {
            let mut core = self.inner.core.lock();
            if core.machine.current_state().is_finishing_or_finished() {
                debug!(operation = %self.inner.name, "Ignoring cancel of a finishing operation");
                return;
            }
            core.errors.extend(errors);
            // Flip the flag under the lock so `start` sees a consistent view
            !self.inner.cancelled.send_replace(true)
        };

        if newly_cancelled {
            debug!(operation = %self.inner.name, "🚫 OPERATION: Cancelled");
            self.inner.work.cancelled(self);
        }
    }

    /// Announce an operation spawned while this one executes.
    ///
    /// The queue running this operation admits `operation` as well.
    pub fn produce_operation(&self, operation: Operation) {
        debug!(
            operation = %self.inner.name,
            produced = %operation.name(),
            "Operation produced a new operation"
        );
        for observer in self.observers() {
            observer.operation_did_produce(self, &operation);
        }
    }

    pub fn finish(&self) {
        self.finish_with_errors(Vec::new());
    }

    pub fn finish_with_error(&self, error: OperationError) {
        self.finish_with_errors(vec![error]);
    }

    /// Terminal transition. Fires at most once; later calls are ignored.
    pub fn finish_with_errors(&self, errors: Vec<OperationError>) {
        let (errors, observers) = {
            let mut core = self.inner.core.lock();
            if let Err(e) = core.machine.transition(OperationEvent::BeginFinishing) {
                debug!(operation = %self.inner.name, error = %e, "Ignoring repeated finish");
                return;
            }
            core.errors.extend(errors);
            (core.errors.clone(), core.observers.clone())
        };

        self.inner.work.finished(self, &errors);
        for observer in &observers {
            observer.operation_did_finish(self, &errors);
        }

        {
            let mut core = self.inner.core.lock();
            if let Err(e) = core.machine.transition(OperationEvent::Finish) {
                warn!(operation = %self.inner.name, error = %e, "Unexpected finish transition");
            }
            core.finished_at = Some(Utc::now());
        }
        self.inner.finished.send_replace(true);

        debug!(
            operation = %self.inner.name,
            error_count = errors.len(),
            cancelled = self.is_cancelled(),
            "✅ OPERATION: Finished"
        );
    }

    /// Wait until the operation has finished and return its errors
    pub async fn wait_until_finished(&self) -> Vec<OperationError> {
        let mut finished = self.inner.finished.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = finished.wait_for(|finished| *finished).await;
        self.errors()
    }

    pub fn snapshot(&self) -> OperationSnapshot {
        let core = self.inner.core.lock();
        OperationSnapshot {
            id: self.inner.id,
            name: self.inner.name.clone(),
            state: core.machine.current_state(),
            cancelled: self.is_cancelled(),
            conditions: core
                .conditions
                .iter()
                .map(|condition| condition.name().to_string())
                .collect(),
            dependency_count: core.dependencies.len(),
            errors: core.errors.clone(),
            created_at: self.inner.created_at,
            finished_at: core.finished_at,
        }
    }

    pub(crate) fn mark_evaluating_conditions(&self) {
        let mut core = self.inner.core.lock();
        if core.machine.current_state() == OperationState::Pending {
            let _ = core.machine.transition(OperationEvent::EvaluateConditions);
        }
    }

    /// Resolve once every dependency has finished (then mark the operation
    /// ready) or as soon as the operation is cancelled.
    pub(crate) async fn wait_until_ready(&self) {
        let mut cancelled = self.inner.cancelled.subscribe();

        loop {
            if self.is_cancelled() {
                return;
            }

            let pending: Vec<Operation> = self
                .dependencies()
                .into_iter()
                .filter(|dependency| !dependency.is_finished())
                .collect();

            if pending.is_empty() {
                if self.try_mark_ready() {
                    return;
                }
                // A dependency slipped in between the snapshot and the lock
                continue;
            }

            tokio::select! {
                _ = futures::future::join_all(pending.iter().map(Operation::wait_until_finished)) => {}
                _ = cancelled.wait_for(|cancelled| *cancelled) => {}
            }
        }
    }

    /// Run the operation's work, or finish straight away if it was cancelled
    pub(crate) async fn start(&self) {
        let observers = {
            let mut core = self.inner.core.lock();
            if self.is_cancelled() {
                None
            } else {
                match core.machine.transition(OperationEvent::Start) {
                    Ok(_) => Some(core.observers.clone()),
                    Err(e) => {
                        warn!(operation = %self.inner.name, error = %e, "Operation cannot start");
                        return;
                    }
                }
            }
        };

        let Some(observers) = observers else {
            debug!(operation = %self.inner.name, "Finishing cancelled operation without executing");
            self.finish();
            return;
        };

        debug!(operation = %self.inner.name, "🚀 OPERATION: Executing");
        for observer in &observers {
            observer.operation_did_start(self);
        }

        let work = Arc::clone(&self.inner.work);
        work.execute(self).await;
    }

    fn try_mark_ready(&self) -> bool {
        let mut core = self.inner.core.lock();
        if core.dependencies.iter().any(|dependency| !dependency.is_finished()) {
            return false;
        }
        match core.machine.current_state() {
            OperationState::Pending | OperationState::EvaluatingConditions => {
                let _ = core.machine.transition(OperationEvent::BecomeReady);
                true
            }
            // Already finishing, e.g. finished from outside while waiting
            _ => true,
        }
    }

    fn transition(&self, event: OperationEvent) -> StateMachineResult<OperationState> {
        self.inner.core.lock().machine.transition(event)
    }

    fn observers(&self) -> Vec<Arc<dyn OperationObserver>> {
        self.inner.core.lock().observers.clone()
    }
}

impl WeakOperation {
    pub fn upgrade(&self) -> Option<Operation> {
        self.inner.upgrade().map(|inner| Operation { inner })
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Operation {}

impl Hash for Operation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl fmt::Debug for WeakOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakOperation")
            .field(&self.upgrade().map(|operation| operation.id()))
            .finish()
    }
}
