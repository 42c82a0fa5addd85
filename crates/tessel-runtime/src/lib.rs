//! Device runtime boundary and arena allocator for tessel.
//!
//! This crate owns the only piece of tessel that talks to a device:
//! - [`Runtime`]: the collaborator that reserves and releases one contiguous
//!   buffer (`CpuRuntime` is the host implementation)
//! - [`Allocator`]: plans non-overlapping byte ranges inside a single linear
//!   address space and materializes the backing buffer on demand

mod allocator;
mod error;
mod runtime;

pub use allocator::{Allocator, DEFAULT_ALIGNMENT};
pub use error::{Result, RuntimeError};
pub use runtime::{CpuRuntime, DevicePtr, Runtime};
