use std::future::Future;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Operation, OperationError};

/// The behaviour injected into an [`Operation`].
///
/// `execute` is the single override point for performing work. It does not
/// have to complete the work before returning: long-running work may be handed
/// off elsewhere, as long as one of the operation's finish variants is called
/// eventually. Dependents stay blocked until then.
#[async_trait]
pub trait Work: Send + Sync + 'static {
    async fn execute(&self, operation: &Operation);

    /// Called once with the full error list, before observers are notified
    fn finished(&self, _operation: &Operation, _errors: &[OperationError]) {}

    /// Called the first time the operation is cancelled
    fn cancelled(&self, _operation: &Operation) {}
}

/// Work that finishes immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyWork;

#[async_trait]
impl Work for EmptyWork {
    async fn execute(&self, operation: &Operation) {
        operation.finish();
    }
}

/// Runs an async block once and finishes with its result
pub struct BlockWork<F> {
    block: Mutex<Option<F>>,
}

impl<F> BlockWork<F> {
    pub fn new(block: F) -> Self {
        Self {
            block: Mutex::new(Some(block)),
        }
    }
}

#[async_trait]
impl<F, Fut> Work for BlockWork<F>
where
    F: FnOnce(Operation) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), OperationError>> + Send + 'static,
{
    async fn execute(&self, operation: &Operation) {
        let block = self.block.lock().take();
        let Some(block) = block else {
            operation.finish();
            return;
        };

        match block(operation.clone()).await {
            Ok(()) => operation.finish(),
            Err(error) => operation.finish_with_error(error),
        }
    }
}
