//! Device boundary: the collaborator that physically reserves memory.

use crate::error::{Result, RuntimeError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Address of a byte inside device memory.
///
/// Addresses are opaque to the planner: it only ever adds byte offsets to the
/// base address returned by [`Runtime::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DevicePtr(usize);

impl DevicePtr {
    /// Wrap a raw address.
    pub fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address.
    pub fn addr(&self) -> usize {
        self.0
    }

    /// Address `bytes` past this one.
    pub fn offset(&self, bytes: usize) -> Self {
        Self(self.0 + bytes)
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A device that can hand out one contiguous block of memory at a time.
///
/// The allocator calls [`allocate`](Runtime::allocate) at most once per
/// planning session and [`release`](Runtime::release) exactly once for every
/// successful allocation.
pub trait Runtime: fmt::Debug {
    /// Human-readable device name (used in diagnostics).
    fn name(&self) -> &str;

    /// Reserve `bytes` of contiguous memory.
    fn allocate(&self, bytes: usize) -> Result<DevicePtr>;

    /// Return memory previously obtained from [`allocate`](Runtime::allocate).
    fn release(&self, ptr: DevicePtr);
}

/// Host-memory runtime.
///
/// Buffers are backed by `u64` words so every base address is 8-byte aligned,
/// matching the widest supported data type.
#[derive(Default)]
pub struct CpuRuntime {
    buffers: Mutex<HashMap<DevicePtr, Box<[u64]>>>,
    allocations: AtomicUsize,
}

impl CpuRuntime {
    /// Create a new host runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `allocate` calls served so far.
    pub fn allocation_count(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Number of buffers currently held by callers.
    pub fn live_buffers(&self) -> usize {
        self.buffers.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Size in bytes of the live buffer starting at `ptr`, if any.
    pub fn buffer_len(&self, ptr: DevicePtr) -> Option<usize> {
        let buffers = self.buffers.lock().ok()?;
        buffers.get(&ptr).map(|words| words.len() * 8)
    }
}

impl fmt::Debug for CpuRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuRuntime")
            .field("live_buffers", &self.live_buffers())
            .field("allocations", &self.allocation_count())
            .finish()
    }
}

impl Runtime for CpuRuntime {
    fn name(&self) -> &str {
        "cpu"
    }

    fn allocate(&self, bytes: usize) -> Result<DevicePtr> {
        // At least one word so every buffer has a distinct address.
        let words = bytes.div_ceil(8).max(1);
        let storage = vec![0u64; words].into_boxed_slice();
        let ptr = DevicePtr::new(storage.as_ptr() as usize);

        let mut buffers = self
            .buffers
            .lock()
            .map_err(|e| RuntimeError::AllocationError(format!("buffer table poisoned: {e}")))?;
        buffers.insert(ptr, storage);
        self.allocations.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(%ptr, bytes, "cpu buffer allocated");
        Ok(ptr)
    }

    fn release(&self, ptr: DevicePtr) {
        if let Ok(mut buffers) = self.buffers.lock() {
            if buffers.remove(&ptr).is_none() {
                tracing::warn!(%ptr, "release of unknown cpu buffer");
            }
        }
    }
}
