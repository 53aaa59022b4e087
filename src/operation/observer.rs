use std::time::Duration;

use tokio::runtime::Handle;
use tracing::warn;

use super::{Operation, OperationError};

/// Passive listener for operation lifecycle events.
///
/// Callbacks run synchronously on whichever task drives the event, so they
/// should hand off anything slow.
pub trait OperationObserver: Send + Sync + 'static {
    fn operation_did_start(&self, _operation: &Operation) {}

    fn operation_did_produce(&self, _operation: &Operation, _produced: &Operation) {}

    fn operation_did_finish(&self, _operation: &Operation, _errors: &[OperationError]) {}
}

type StartHandler = Box<dyn Fn(&Operation) + Send + Sync>;
type ProduceHandler = Box<dyn Fn(&Operation, &Operation) + Send + Sync>;
type FinishHandler = Box<dyn Fn(&Operation, &[OperationError]) + Send + Sync>;

/// Observer built from closures
#[derive(Default)]
pub struct BlockObserver {
    start: Option<StartHandler>,
    produce: Option<ProduceHandler>,
    finish: Option<FinishHandler>,
}

impl BlockObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, handler: impl Fn(&Operation) + Send + Sync + 'static) -> Self {
        self.start = Some(Box::new(handler));
        self
    }

    pub fn on_produce(
        mut self,
        handler: impl Fn(&Operation, &Operation) + Send + Sync + 'static,
    ) -> Self {
        self.produce = Some(Box::new(handler));
        self
    }

    pub fn on_finish(
        mut self,
        handler: impl Fn(&Operation, &[OperationError]) + Send + Sync + 'static,
    ) -> Self {
        self.finish = Some(Box::new(handler));
        self
    }
}

impl OperationObserver for BlockObserver {
    fn operation_did_start(&self, operation: &Operation) {
        if let Some(handler) = &self.start {
            handler(operation);
        }
    }

    fn operation_did_produce(&self, operation: &Operation, produced: &Operation) {
        if let Some(handler) = &self.produce {
            handler(operation, produced);
        }
    }

    fn operation_did_finish(&self, operation: &Operation, errors: &[OperationError]) {
        if let Some(handler) = &self.finish {
            handler(operation, errors);
        }
    }
}

/// Cancels an operation that is still running `timeout` after it started
#[derive(Debug, Clone, Copy)]
pub struct TimeoutObserver {
    timeout: Duration,
}

impl TimeoutObserver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl OperationObserver for TimeoutObserver {
    fn operation_did_start(&self, operation: &Operation) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                operation = %operation.name(),
                "No Tokio runtime available, timeout not armed"
            );
            return;
        };

        let timeout = self.timeout;
        let operation = operation.downgrade();
        runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(operation) = operation.upgrade() else {
                return;
            };
            if !operation.is_finished() {
                warn!(
                    operation = %operation.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "⏰ OPERATION: Timed out, cancelling"
                );
                operation.cancel_with_error(OperationError::TimedOut { after: timeout });
            }
        });
    }
}
