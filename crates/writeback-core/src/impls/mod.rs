//! Implementations of the ports (in-memory, for in-process use).

pub mod memory_sink;

pub use memory_sink::InMemoryIssueSink;
