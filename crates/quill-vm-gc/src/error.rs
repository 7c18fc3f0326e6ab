//! GC errors

use crate::object::GcRef;
use thiserror::Error;

/// Errors raised by the heap
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GcError {
    /// The heap limit would be exceeded by this allocation
    #[error("Out of memory: requested {requested} bytes with {alive} alive (limit {limit})")]
    OutOfMemory {
        /// Bytes requested by the failed allocation
        requested: usize,
        /// Bytes alive at the time of the request
        alive: usize,
        /// Configured limit
        limit: usize,
    },

    /// Handle points at a freed or reused slot
    #[error("Stale object handle {0:?}")]
    StaleHandle(GcRef),

    /// More objects survived shutdown than expected
    #[error("Memory leak detected: {alive} objects alive, expected {expected}")]
    LeakDetected {
        /// Objects still alive
        alive: usize,
        /// Expected sentinel count
        expected: usize,
    },
}

/// Result type for heap operations
pub type Result<T> = std::result::Result<T, GcError>;
