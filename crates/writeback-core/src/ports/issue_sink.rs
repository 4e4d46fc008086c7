//! Issue sink ports: report and retrieve problem records.

use crate::domain::Issue;

/// Receiving side of an issue sink.
///
/// Synchronous on purpose: implementations hold a plain lock around an
/// in-memory set, and reporters (including background write tasks) must be
/// able to call this from any context without awaiting.
pub trait IssueReceiver: Send + Sync {
    /// Record `issue` unless an identical one was already reported.
    fn accept_issue(&self, issue: Issue);
}

/// Reading side of an issue sink, for diagnostics pages and operators.
pub trait IssueProvider: Send + Sync {
    /// Returns a copy of the reported issues, in report order.
    fn issues(&self) -> Vec<Issue>;
}
