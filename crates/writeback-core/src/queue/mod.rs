//! Write-behind queue: admission outcomes and the pending-write registry.

mod registry;

pub use registry::{DEFAULT_MAX_QUEUE_BYTES, PendingWriteRegistry};

use tokio::task::JoinHandle;

/// Outcome of offering a task to the registry.
///
/// The three variants are mutually exclusive and exhaustive; there is no
/// other admission state.
#[derive(Debug)]
pub enum EnqueueOutcome {
    /// Admitted; the persistence operation is running on a background task.
    ///
    /// The handle is detached: dropping it is the normal fire-and-forget
    /// path, awaiting it is how tests and shutdown paths observe settlement.
    /// Slot cleanup does not depend on anyone holding this handle.
    Enqueued { handle: JoinHandle<()> },

    /// A write for the same key is already in flight. The caller can treat
    /// this as a no-op: the in-flight write will produce the same target.
    AlreadyPresent,

    /// Admitting this task would push buffered bytes past the queue bound.
    /// The caller's contract is to fall back to a synchronous write.
    QueueFull,
}

impl EnqueueOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, EnqueueOutcome::Enqueued { .. })
    }
}
