use std::sync::Arc;
use std::time::Instant;

use opflow::operation::{Operation, OperationError, OperationObserver};
use parking_lot::Mutex;

/// Lifecycle event captured by [`Recorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Produced(String, String),
    Finished(String, usize),
}

/// Shared event log; attach it to as many operations as needed
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<(Instant, Event)>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, operation: &Operation) {
        operation.add_observer(self.clone());
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().iter().map(|(_, event)| event.clone()).collect()
    }

    pub fn started_at(&self, name: &str) -> Option<Instant> {
        self.find(|event| matches!(event, Event::Started(n) if n == name))
    }

    pub fn finished_at(&self, name: &str) -> Option<Instant> {
        self.find(|event| matches!(event, Event::Finished(n, _) if n == name))
    }

    pub fn count_finished(&self, name: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Finished(n, _) if n == name))
            .count()
    }

    fn find(&self, predicate: impl Fn(&Event) -> bool) -> Option<Instant> {
        self.events
            .lock()
            .iter()
            .find(|(_, event)| predicate(event))
            .map(|(at, _)| *at)
    }

    fn push(&self, event: Event) {
        self.events.lock().push((Instant::now(), event));
    }
}

impl OperationObserver for Recorder {
    fn operation_did_start(&self, operation: &Operation) {
        self.push(Event::Started(operation.name().to_string()));
    }

    fn operation_did_produce(&self, operation: &Operation, produced: &Operation) {
        self.push(Event::Produced(
            operation.name().to_string(),
            produced.name().to_string(),
        ));
    }

    fn operation_did_finish(&self, operation: &Operation, errors: &[OperationError]) {
        self.push(Event::Finished(operation.name().to_string(), errors.len()));
    }
}
