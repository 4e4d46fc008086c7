//! writeback-core
//!
//! Asynchronous write-behind queue for a disk-backed cache: a bounded,
//! key-deduplicated registry of pending writes, each executed on a
//! background task and removed when it settles.
//!
//! # Module layout
//! - **domain**: [`WriteTask`](domain::WriteTask), [`Issue`](domain::Issue)
//! - **queue**: [`PendingWriteRegistry`](queue::PendingWriteRegistry) and
//!   [`EnqueueOutcome`](queue::EnqueueOutcome)
//! - **ports**: [`Persister`](ports::Persister) (the injected durable-store
//!   operation) and the issue-sink traits
//! - **impls**: [`InMemoryIssueSink`](impls::InMemoryIssueSink)
//! - **error**: [`PersistError`](error::PersistError)
//! - **observability**: [`RegistryStats`](observability::RegistryStats)
//!
//! The registry makes three promises: at most one in-flight write per key,
//! buffered bytes bounded at admission time, and guaranteed slot release on
//! every completion path. It makes no promise about the fate of an admitted
//! write — persistence is fire-and-forget from the caller's point of view.

pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;

pub use domain::{Issue, IssueSeverity, WriteTask};
pub use error::PersistError;
pub use impls::InMemoryIssueSink;
pub use observability::RegistryStats;
pub use ports::{IssueProvider, IssueReceiver, Persister};
pub use queue::{DEFAULT_MAX_QUEUE_BYTES, EnqueueOutcome, PendingWriteRegistry};
