use thiserror::Error;

/// Failure of an injected persistence operation.
///
/// The registry never inspects these beyond logging them; the type exists so
/// persistence implementations have a concrete error to return and so
/// collaborators (issue sinks, callers doing synchronous fallback) can
/// describe what went wrong.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl PersistError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
