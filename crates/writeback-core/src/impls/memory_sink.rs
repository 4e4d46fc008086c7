//! In-memory issue sink with content-hash deduplication.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::domain::Issue;
use crate::ports::{IssueProvider, IssueReceiver};

struct SinkState {
    /// Content hashes of every issue accepted so far.
    seen: HashSet<u64>,

    /// Accepted issues in report order.
    issues: Vec<Issue>,
}

/// Thread-safe set of reported problem records.
///
/// Duplicate reports (same severity/source/summary/details) are dropped, so
/// a persistently failing write produces one record instead of one per
/// attempt. Long-lived: issues accumulate until the process exits.
pub struct InMemoryIssueSink {
    default_source: String,
    state: Mutex<SinkState>,
}

impl InMemoryIssueSink {
    /// `default_source` is stamped onto issues reported without one.
    pub fn new(default_source: impl Into<String>) -> Self {
        Self {
            default_source: default_source.into(),
            state: Mutex::new(SinkState {
                seen: HashSet::new(),
                issues: Vec::new(),
            }),
        }
    }
}

impl IssueReceiver for InMemoryIssueSink {
    fn accept_issue(&self, mut issue: Issue) {
        if issue.source.is_none() {
            issue.source = Some(self.default_source.clone());
        }

        // Hash after the source fill-in so "no source" and "explicitly the
        // default source" dedupe against each other.
        let hash = issue.content_hash();

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.seen.insert(hash) {
            state.issues.push(issue);
        }
    }
}

impl IssueProvider for InMemoryIssueSink {
    fn issues(&self) -> Vec<Issue> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.issues.clone()
    }
}
