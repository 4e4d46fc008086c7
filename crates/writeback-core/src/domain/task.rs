//! Write task: the unit of work handed to the registry.

use std::fmt;

/// A buffered write waiting to be persisted.
///
/// Design:
/// - `key` uniquely identifies the logical write target (e.g. a
///   cache-relative path combined with the source modification time).
/// - `buffer` is read-only once attached; its length is the unit of
///   memory accounting for the queue bound.
/// - The registry owns the task from admission until removal. Callers
///   observing an in-flight write through `get()` hold a shared reference
///   and can read the buffer but never mutate it.
pub struct WriteTask {
    key: String,
    buffer: Vec<u8>,
}

impl WriteTask {
    pub fn new(key: impl Into<String>, buffer: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            buffer,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Bytes of buffered data this task holds in memory. This is what the
    /// registry charges against its queue bound, not the encoded size that
    /// will eventually reach disk.
    pub fn buffer_len(&self) -> u64 {
        self.buffer.len() as u64
    }
}

impl fmt::Debug for WriteTask {
    // Skip the buffer contents; tasks routinely hold megabytes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTask")
            .field("key", &self.key)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}
