//! # Orchestration
//!
//! Scheduling on top of the operation model.
//!
//! ## Core Components
//!
//! - **ExclusivityController**: per-category registry of in-flight operations,
//!   shared by every queue that must honour the same exclusivity rules
//! - **OperationQueue**: admission pipeline that turns conditions and
//!   exclusivity into dependency edges, then runs operations on Tokio
//! - **GroupOperation**: an operation backed by its own private queue
//!
//! ## Admission
//!
//! ```text
//! add_operation(op)
//!   -> op.will_enqueue()
//!   -> admit each condition's dependency operation, op depends on it
//!   -> register with the exclusivity controller, op depends on predecessors
//!   -> condition evaluator (depends on all of the above), op depends on it
//!   -> completion observer: unregister exclusivity, notify delegate
//!   -> delegate.will_add_operation, spawn
//! ```

pub mod exclusivity_controller;
pub mod group_operation;
pub mod operation_queue;

pub use exclusivity_controller::ExclusivityController;
pub use group_operation::{ChildFinishedHandler, GroupOperation};
pub use operation_queue::{OperationQueue, QueueDelegate};
