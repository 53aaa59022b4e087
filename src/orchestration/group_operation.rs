//! # Group Operation
//!
//! An operation that runs a set of child operations on a private queue and
//! finishes once all of them have. Children can be added while the group
//! runs, including operations produced by the children themselves.
//!
//! The private queue starts suspended so children admitted at construction
//! wait for the group's own execution. A finishing sentinel operation depends
//! on every child; when it finishes the group finishes with the errors
//! aggregated from its children, in the order the children finished.
//!
//! Children can no longer be added once the sentinel is ready: every known
//! child has finished and the group is about to complete.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::exclusivity_controller::ExclusivityController;
use super::operation_queue::{OperationQueue, QueueDelegate};
use crate::config::QueueConfig;
use crate::error::{OpflowError, Result};
use crate::operation::{Operation, OperationError, WeakOperation, Work};
use crate::state_machine::{OperationEvent, OperationState, StateMachineError};

/// Reaction to a child finishing. Replaces the default aggregation of the
/// child's errors; call [`GroupOperation::aggregate_error`] to keep any.
pub type ChildFinishedHandler =
    Arc<dyn Fn(&GroupOperation, &Operation, &[OperationError]) + Send + Sync>;

/// Handle to a group operation. Enqueue [`GroupOperation::operation`] (or
/// convert the group into an [`Operation`]) to run it.
#[derive(Clone)]
pub struct GroupOperation {
    operation: Operation,
    state: Arc<GroupState>,
}

struct GroupState {
    this: Weak<GroupState>,
    group: OnceLock<WeakOperation>,
    queue: OperationQueue,
    finishing: Operation,
    aggregated: Mutex<Vec<OperationError>>,
    child_finished: RwLock<Option<ChildFinishedHandler>>,
}

struct GroupWork {
    state: Arc<GroupState>,
}

impl GroupOperation {
    /// Create a group over `operations`, sharing the process-wide
    /// exclusivity controller. Must be called from within a Tokio runtime.
    pub fn new(name: impl Into<String>, operations: Vec<Operation>) -> Result<Self> {
        Self::with_controller(name, operations, ExclusivityController::shared())
    }

    pub fn with_controller(
        name: impl Into<String>,
        operations: Vec<Operation>,
        exclusivity: Arc<ExclusivityController>,
    ) -> Result<Self> {
        let name = name.into();
        let queue = OperationQueue::with_config(
            QueueConfig {
                name: format!("{name}.queue"),
                max_concurrent_operations: None,
                start_suspended: true,
            },
            exclusivity,
        );
        let finishing = Operation::empty(format!("{name}.finishing"));

        let state = Arc::new_cyclic(|this| GroupState {
            this: this.clone(),
            group: OnceLock::new(),
            queue,
            finishing,
            aggregated: Mutex::new(Vec::new()),
            child_finished: RwLock::new(None),
        });
        state.queue.set_delegate(&state);

        let operation = Operation::new(
            name,
            GroupWork {
                state: Arc::clone(&state),
            },
        );
        // Freshly created, cannot already be set
        let _ = state.group.set(operation.downgrade());

        let group = Self { operation, state };
        for child in operations {
            group.add_operation(child)?;
        }
        group
            .state
            .queue
            .add_operation(group.state.finishing.clone())?;

        Ok(group)
    }

    /// The group's own operation handle
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn into_operation(self) -> Operation {
        self.operation
    }

    /// Add a child. The group will not finish before it does.
    ///
    /// Fails once the group is completing, as well as for operations the
    /// queue itself would reject.
    pub fn add_operation(&self, operation: Operation) -> Result<()> {
        if operation.state() != OperationState::Initialized {
            return Err(StateMachineError::InvalidTransition {
                from: operation.state(),
                event: OperationEvent::Enqueue,
            }
            .into());
        }
        if !self.state.finishing.try_add_dependency(&operation) {
            return Err(OpflowError::Validation(format!(
                "group '{}' already completed, cannot add '{}'",
                self.operation.name(),
                operation.name()
            )));
        }

        let result = self.state.queue.add_operation(operation.clone());
        if result.is_err() {
            self.state.finishing.remove_dependency(&operation);
        }
        result
    }

    /// Record an error that belongs to the group itself rather than a child
    pub fn aggregate_error(&self, error: OperationError) {
        self.state.aggregated.lock().push(error);
    }

    pub fn aggregated_errors(&self) -> Vec<OperationError> {
        self.state.aggregated.lock().clone()
    }

    /// Install a handler invoked each time a child finishes, in place of
    /// the default aggregation of that child's errors
    pub fn on_child_finished(
        &self,
        handler: impl Fn(&GroupOperation, &Operation, &[OperationError]) + Send + Sync + 'static,
    ) {
        *self.state.child_finished.write() = Some(Arc::new(handler));
    }
}

impl From<GroupOperation> for Operation {
    fn from(group: GroupOperation) -> Self {
        group.operation
    }
}

impl GroupState {
    fn handle(&self) -> Option<GroupOperation> {
        Some(GroupOperation {
            operation: self.group.get()?.upgrade()?,
            state: self.this.upgrade()?,
        })
    }
}

impl QueueDelegate for GroupState {
    fn will_add_operation(&self, _queue: &OperationQueue, operation: &Operation) {
        if *operation == self.finishing {
            return;
        }
        // Produced operations arrive here without going through
        // `GroupOperation::add_operation`
        if !self.finishing.try_add_dependency(operation) {
            warn!(
                operation = %operation.name(),
                group = %self.finishing.name(),
                "Operation added to a group that already completed"
            );
        }
    }

    fn operation_did_finish(
        &self,
        queue: &OperationQueue,
        operation: &Operation,
        errors: &[OperationError],
    ) {
        if *operation == self.finishing {
            queue.set_suspended(true);
            let errors = self.aggregated.lock().clone();
            match self.group.get().and_then(WeakOperation::upgrade) {
                Some(group) => {
                    debug!(group = %group.name(), errors = errors.len(), "Group finished all children");
                    group.finish_with_errors(errors);
                }
                None => warn!(queue = %queue.name(), "Group dropped before its children finished"),
            }
            return;
        }

        let handler = self.child_finished.read().clone();
        match (handler, self.handle()) {
            (Some(handler), Some(group)) => handler(&group, operation, errors),
            _ => self.aggregated.lock().extend_from_slice(errors),
        }
    }
}

#[async_trait]
impl Work for GroupWork {
    async fn execute(&self, operation: &Operation) {
        debug!(group = %operation.name(), children = self.state.finishing.dependencies().len(), "Starting group");
        self.state.queue.set_suspended(false);
    }

    fn cancelled(&self, _operation: &Operation) {
        for child in self.state.queue.operations() {
            if child != self.state.finishing {
                child.cancel();
            }
        }
        // Let cancelled children drain
        self.state.queue.set_suspended(false);
    }
}
