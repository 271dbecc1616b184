//! Error types for allocation and link-graph operations.

use thiserror::Error;

/// Error returned when a block allocation cannot be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The system allocator returned null.
    #[error("allocation of {size} payload bytes failed")]
    OutOfMemory {
        /// Requested payload size in bytes.
        size: usize,
    },
    /// The requested size overflowed when combined with the block header.
    #[error("payload size {size} overflows the maximum allocation size")]
    LayoutOverflow {
        /// Requested payload size in bytes.
        size: usize,
    },
}

/// Error returned when a link cannot be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The edge would close a parent→child ownership cycle.
    #[error("link would create an ownership cycle")]
    Cycle,
    /// The link node allocation failed; the parent's edge list is unchanged.
    #[error("link node allocation failed")]
    NodeAllocation,
}
