use opflow::operation::{Operation, OperationError};
use opflow::orchestration::{OperationQueue, QueueDelegate};
use parking_lot::Mutex;

/// Queue delegate that records every callback it receives
#[derive(Debug, Default)]
pub struct MockDelegate {
    pub added: Mutex<Vec<String>>,
    pub finished: Mutex<Vec<(String, Vec<OperationError>)>>,
}

impl MockDelegate {
    pub fn added_names(&self) -> Vec<String> {
        self.added.lock().clone()
    }

    pub fn finished_names(&self) -> Vec<String> {
        self.finished.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn errors_for(&self, name: &str) -> Option<Vec<OperationError>> {
        self.finished
            .lock()
            .iter()
            .find(|(finished, _)| finished == name)
            .map(|(_, errors)| errors.clone())
    }
}

impl QueueDelegate for MockDelegate {
    fn will_add_operation(&self, _queue: &OperationQueue, operation: &Operation) {
        self.added.lock().push(operation.name().to_string());
    }

    fn operation_did_finish(
        &self,
        _queue: &OperationQueue,
        operation: &Operation,
        errors: &[OperationError],
    ) {
        self.finished
            .lock()
            .push((operation.name().to_string(), errors.to_vec()));
    }
}
