pub mod conditions;
pub mod mock_delegate;
pub mod recorder;

pub use conditions::*;
pub use mock_delegate::*;
pub use recorder::*;

use std::sync::Arc;

use opflow::orchestration::{ExclusivityController, OperationQueue};

/// Queue with its own exclusivity controller so tests never share state
pub fn isolated_queue() -> (OperationQueue, Arc<ExclusivityController>) {
    let controller = Arc::new(ExclusivityController::new());
    (
        OperationQueue::with_exclusivity(Arc::clone(&controller)),
        controller,
    )
}
