use async_trait::async_trait;

use super::{Condition, ConditionResult};
use crate::operation::Operation;

/// Category used for operations that present alerts or prompts
pub const ALERT_PRESENTATION: &str = "Alert";

/// Marks an operation as mutually exclusive with every other operation in
/// the same category, across all queues sharing an exclusivity controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutuallyExclusive {
    name: String,
    category: String,
}

impl MutuallyExclusive {
    pub fn new(category: impl Into<String>) -> Self {
        let category = category.into();
        Self {
            name: format!("MutuallyExclusive<{category}>"),
            category,
        }
    }

    /// Exclusivity for operations that may present an alert
    pub fn alert_presentation() -> Self {
        Self::new(ALERT_PRESENTATION)
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

#[async_trait]
impl Condition for MutuallyExclusive {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_mutually_exclusive(&self) -> bool {
        true
    }

    async fn evaluate(&self, _operation: &Operation) -> ConditionResult {
        ConditionResult::Satisfied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mutually_exclusive_condition() {
        let condition = MutuallyExclusive::alert_presentation();
        assert_eq!(condition.name(), "MutuallyExclusive<Alert>");
        assert_eq!(condition.category(), "Alert");
        assert!(condition.is_mutually_exclusive());

        let op = Operation::empty("alert");
        assert!(condition.dependency_for_operation(&op).is_none());
        assert!(condition.evaluate(&op).await.is_satisfied());
    }
}
