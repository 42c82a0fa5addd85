//! Error types for the runtime crate.

use thiserror::Error;

/// Runtime and allocator errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The device could not provide a buffer.
    #[error("Buffer allocation failed: {0}")]
    AllocationError(String),

    /// A release or free targeted a range the allocator does not track.
    #[error("Range [{offset}, {end}) is not a live allocation", end = .offset + .size)]
    NotLive { offset: usize, size: usize },

    /// A freed range only partially overlaps the live range that starts before it.
    #[error(
        "Range [{offset}, {end}) overruns live allocation [{block_start}, {block_end})",
        end = .offset + .size,
        block_end = .block_start + .block_size
    )]
    Overrun {
        offset: usize,
        size: usize,
        block_start: usize,
        block_size: usize,
    },

    /// The allocator has already requested its backing buffer.
    #[error("Allocator already materialized; the address space is frozen")]
    AlreadyMaterialized,

    /// Invalid allocator configuration.
    #[error("Invalid alignment {0}: must be a non-zero power of two")]
    InvalidAlignment(usize),
}

/// Specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
