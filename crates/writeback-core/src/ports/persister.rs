//! Persister port: the injected durable-store operation.

use async_trait::async_trait;

use crate::domain::WriteTask;
use crate::error::PersistError;

/// Durably persists a write task.
///
/// This is the seam between the registry and whatever store actually owns
/// the bytes (local disk, blob storage, ...). The registry invokes it on a
/// background task and only cares that it finished; success and failure are
/// treated the same for slot cleanup.
///
/// Implementations must terminate: the registry applies no timeout and
/// offers no cancellation once a write is admitted.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn persist(&self, task: &WriteTask) -> Result<(), PersistError>;
}
