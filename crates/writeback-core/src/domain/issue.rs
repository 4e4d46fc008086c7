//! Issue record: a reported problem, deduplicated by content.

use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a reported issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueSeverity {
    /// The component cannot operate (e.g. the cache directory is not
    /// writable at all).
    Critical,
    /// An operation failed and data may have been lost.
    Error,
    /// Degraded behavior that an operator should eventually look at.
    Warning,
}

/// A reported problem record.
///
/// Sinks deduplicate issues by [`Issue::content_hash`], so repeated
/// failures of the same kind collapse into a single record instead of
/// growing without bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub severity: IssueSeverity,

    /// Component that reported the issue. Sinks fill in their default
    /// source when this is `None`.
    pub source: Option<String>,

    /// One-line description.
    pub summary: String,

    /// Free-form detail (error chain, path, etc.).
    pub details: Option<String>,

    pub reported_at: DateTime<Utc>,
}

impl Issue {
    pub fn new(severity: IssueSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            source: None,
            summary: summary.into(),
            details: None,
            reported_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Content hash used for duplicate suppression.
    ///
    /// The report timestamp is excluded so repeats of the same problem hash
    /// identically regardless of when they were observed.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.severity.hash(&mut hasher);
        self.source.hash(&mut hasher);
        self.summary.hash(&mut hasher);
        self.details.hash(&mut hasher);
        hasher.finish()
    }
}
