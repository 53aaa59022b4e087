#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Opflow
//!
//! Cooperative orchestration of asynchronous operations.
//!
//! ## Overview
//!
//! Opflow composes units of asynchronous work ("operations") that may depend
//! on each other, must satisfy declarative preconditions before running, must
//! respect mutual-exclusion rules across otherwise unrelated work, and report
//! every error they accumulate to whoever is interested.
//!
//! ## Module Organization
//!
//! - [`operation`] - The operation handle, injected work, observers and errors
//! - [`state_machine`] - Operation lifecycle states and transitions
//! - [`conditions`] - The condition contract, evaluator and generic conditions
//! - [`orchestration`] - Exclusivity controller, operation queue, group operation
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use opflow::conditions::MutuallyExclusive;
//! use opflow::operation::Operation;
//! use opflow::orchestration::OperationQueue;
//!
//! # async fn example() -> opflow::Result<()> {
//! let queue = OperationQueue::new();
//!
//! let alert = Operation::block("show alert", |_| async { Ok(()) });
//! alert.add_condition(MutuallyExclusive::alert_presentation());
//!
//! queue.add_operations(vec![alert], true).await?;
//! # Ok(())
//! # }
//! ```

pub mod conditions;
pub mod config;
pub mod error;
pub mod logging;
pub mod operation;
pub mod orchestration;
pub mod state_machine;

pub use conditions::{Condition, ConditionEvaluator, ConditionResult};
pub use config::{ConfigManager, LoggingConfig, OpflowConfig, QueueConfig};
pub use error::{OpflowError, Result};
pub use operation::{
    BlockObserver, Operation, OperationError, OperationObserver, OperationSnapshot,
    TimeoutObserver, WeakOperation, Work,
};
pub use orchestration::{ExclusivityController, GroupOperation, OperationQueue, QueueDelegate};
pub use state_machine::{OperationEvent, OperationState};
