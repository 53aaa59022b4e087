//! # Conditions
//!
//! Declarative preconditions an operation must satisfy before it executes.
//! A condition may contribute a dependency operation (run first, e.g. to ask
//! for a permission) and may declare itself mutually exclusive, in which case
//! its name is the exclusivity category.

pub mod evaluator;
pub mod mutually_exclusive;
pub mod negated;
pub mod no_cancelled_dependencies;
pub mod silent;

use async_trait::async_trait;

use crate::operation::{Operation, OperationError};

pub use evaluator::ConditionEvaluator;
pub use mutually_exclusive::MutuallyExclusive;
pub use negated::NegatedCondition;
pub use no_cancelled_dependencies::NoCancelledDependencies;
pub use silent::SilentCondition;

/// Verdict of a single condition evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionResult {
    Satisfied,
    Failed(OperationError),
}

impl ConditionResult {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    pub fn into_error(self) -> Option<OperationError> {
        match self {
            Self::Satisfied => None,
            Self::Failed(error) => Some(error),
        }
    }
}

/// A precondition gate for an operation
#[async_trait]
pub trait Condition: Send + Sync + 'static {
    /// Name of the condition; also the exclusivity category when the
    /// condition is mutually exclusive
    fn name(&self) -> &str;

    /// Whether operations carrying this condition must not run concurrently
    fn is_mutually_exclusive(&self) -> bool {
        false
    }

    /// An operation to run before `operation` that may help satisfy the
    /// condition. Only one may be returned; express more as more conditions.
    fn dependency_for_operation(&self, _operation: &Operation) -> Option<Operation> {
        None
    }

    async fn evaluate(&self, operation: &Operation) -> ConditionResult;
}
