//! Ports (interfaces) to external collaborators.
//!
//! The registry itself talks only to [`Persister`] (or a bare closure, see
//! `PendingWriteRegistry::enqueue`). The issue-sink traits are the contract
//! for the companion diagnostics collaborator; the registry has no direct
//! dependency on them.

pub mod issue_sink;
pub mod persister;

pub use self::issue_sink::{IssueProvider, IssueReceiver};
pub use self::persister::Persister;
