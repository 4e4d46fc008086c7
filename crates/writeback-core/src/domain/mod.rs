//! Domain model (write tasks, issue records).

pub mod issue;
pub mod task;

pub use issue::{Issue, IssueSeverity};
pub use task::WriteTask;
