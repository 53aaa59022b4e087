//! # Exclusivity Controller
//!
//! Registry of in-flight operations per mutual-exclusion category.
//!
//! Admission appends the operation to each of its categories and hands back
//! everything registered before it; the queue turns those predecessors into
//! dependencies, so operations in one category run one at a time, in
//! admission order. Every queue that shares a controller shares the
//! guarantee. [`ExclusivityController::shared`] is the process-wide instance
//! queues use by default.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::debug;

use crate::operation::Operation;

static SHARED: OnceLock<Arc<ExclusivityController>> = OnceLock::new();

#[derive(Debug, Default)]
pub struct ExclusivityController {
    categories: Mutex<HashMap<String, Vec<Operation>>>,
}

impl ExclusivityController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide controller
    pub fn shared() -> Arc<Self> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    /// Register `operation` under `categories`.
    ///
    /// Returns the union of operations registered in any of the categories
    /// before this call, oldest first, without duplicates. The registration
    /// is atomic across all categories.
    pub fn add_operation(&self, operation: &Operation, categories: &[String]) -> Vec<Operation> {
        let mut registry = self.categories.lock();
        let mut predecessors: Vec<Operation> = Vec::new();

        for category in dedup(categories) {
            let registered = registry.entry(category.clone()).or_default();
            for existing in registered.iter() {
                if existing != operation && !predecessors.contains(existing) {
                    predecessors.push(existing.clone());
                }
            }
            registered.push(operation.clone());
        }

        debug!(
            operation = %operation.name(),
            categories = ?categories,
            predecessors = predecessors.len(),
            "🔒 EXCLUSIVITY: Registered operation"
        );

        predecessors
    }

    /// Unregister `operation` from `categories`. Categories that never held
    /// it are ignored; categories left empty are dropped.
    pub fn remove_operation(&self, operation: &Operation, categories: &[String]) {
        let mut registry = self.categories.lock();

        for category in categories {
            let Some(registered) = registry.get_mut(category) else {
                continue;
            };
            registered.retain(|existing| existing != operation);
            if registered.is_empty() {
                registry.remove(category);
            }
        }

        debug!(
            operation = %operation.name(),
            categories = ?categories,
            "🔓 EXCLUSIVITY: Unregistered operation"
        );
    }

    /// Operations currently registered in `category`, in admission order
    pub fn operations_in(&self, category: &str) -> Vec<Operation> {
        self.categories
            .lock()
            .get(category)
            .cloned()
            .unwrap_or_default()
    }

    /// Categories with at least one registered operation
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self.categories.lock().keys().cloned().collect();
        categories.sort();
        categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.lock().is_empty()
    }
}

fn dedup(categories: &[String]) -> Vec<&String> {
    let mut unique: Vec<&String> = Vec::with_capacity(categories.len());
    for category in categories {
        if !unique.contains(&category) {
            unique.push(category);
        }
    }
    unique
}
