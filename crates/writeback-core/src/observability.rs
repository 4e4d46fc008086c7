use serde::{Deserialize, Serialize};

/// Point-in-time view of the registry, taken in one pass under its lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Number of writes currently in flight.
    pub depth: usize,

    /// Sum of their buffer lengths.
    pub buffered_bytes: u64,
}
