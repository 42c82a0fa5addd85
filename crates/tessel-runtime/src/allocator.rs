//! Linear address-space planner.
//!
//! The allocator never touches device memory while ranges are being planned.
//! It hands out byte offsets inside a single virtual arena, tracking the live
//! ranges in an offset-ordered ledger, and only asks the [`Runtime`] for one
//! buffer of `peak` bytes once planning is over.
//!
//! ```text
//!  0                                  tail          peak
//!  | live | gap | live | live |  gap  |    slack     |
//! ```
//!
//! Placement order for a request of `n` aligned bytes:
//! 1. the slack between `tail` and `peak`, if it fits (no scan),
//! 2. the first gap between two live ranges that fits,
//! 3. the tail, growing `peak`.

use crate::error::{Result, RuntimeError};
use crate::runtime::{DevicePtr, Runtime};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Default alignment: the width of the widest supported data type.
pub const DEFAULT_ALIGNMENT: usize = std::mem::size_of::<u64>();

/// First-fit arena allocator with tail reuse.
pub struct Allocator {
    runtime: Arc<dyn Runtime>,
    alignment: usize,

    /// Live bytes.
    used: usize,

    /// High-water mark of the address space; the size of the final buffer.
    peak: usize,

    /// End of the currently reserved address range.
    tail: usize,

    /// Start offset -> length of every live range.
    ledger: BTreeMap<usize, usize>,

    /// Backing buffer, once materialized.
    base: Option<DevicePtr>,
}

impl Allocator {
    /// Create an allocator with the default 8-byte alignment.
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            runtime,
            alignment: DEFAULT_ALIGNMENT,
            used: 0,
            peak: 0,
            tail: 0,
            ledger: BTreeMap::new(),
            base: None,
        }
    }

    /// Create an allocator with a custom alignment.
    ///
    /// # Errors
    ///
    /// Returns an error if `alignment` is zero or not a power of two.
    pub fn with_alignment(runtime: Arc<dyn Runtime>, alignment: usize) -> Result<Self> {
        if !alignment.is_power_of_two() {
            return Err(RuntimeError::InvalidAlignment(alignment));
        }
        let mut allocator = Self::new(runtime);
        allocator.alignment = alignment;
        Ok(allocator)
    }

    /// Round `size` up to the allocator's alignment.
    ///
    /// Zero-byte requests occupy one alignment unit. Returns `None` if the
    /// rounded size does not fit in `usize`.
    pub fn aligned_size(&self, size: usize) -> Option<usize> {
        size.max(1)
            .div_ceil(self.alignment)
            .checked_mul(self.alignment)
    }

    fn checked_size(&self, size: usize) -> Result<usize> {
        self.aligned_size(size).ok_or_else(|| {
            RuntimeError::AllocationError(format!("request of {size} bytes overflows the arena"))
        })
    }

    /// Reserve a range of `aligned_size(size)` bytes and return its offset.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::AlreadyMaterialized`] once the backing buffer
    /// exists, or [`RuntimeError::AllocationError`] if the arena would grow
    /// past `usize::MAX`.
    pub fn alloc(&mut self, size: usize) -> Result<usize> {
        self.ensure_planning()?;
        let size = self.checked_size(size)?;
        let grown = self.tail.checked_add(size).ok_or_else(|| {
            RuntimeError::AllocationError(format!("request of {size} bytes overflows the arena"))
        })?;
        self.used += size;

        // Slack left behind by a freed trailing range.
        if self.peak - self.tail >= size {
            return Ok(self.push_tail(size));
        }

        if let Some(offset) = self.first_fit(size) {
            self.ledger.insert(offset, size);
            return Ok(offset);
        }

        self.peak = grown;
        Ok(self.push_tail(size))
    }

    /// Start of the lowest gap between live ranges that holds `size` bytes.
    fn first_fit(&self, size: usize) -> Option<usize> {
        let mut cursor = 0;
        for (&offset, &len) in &self.ledger {
            if cursor + size <= offset {
                return Some(cursor);
            }
            cursor = offset + len;
        }
        None
    }

    fn push_tail(&mut self, size: usize) -> usize {
        let offset = self.tail;
        self.ledger.insert(offset, size);
        self.tail += size;
        offset
    }

    /// Release `aligned_size(size)` bytes starting at `offset`.
    ///
    /// The span may be a whole live range or any sub-range of one; releasing
    /// an interior sub-range splits the live range in two.
    ///
    /// # Errors
    ///
    /// Returns an error if the span is not fully covered by a single live
    /// range, or if the allocator is already materialized.
    pub fn free(&mut self, offset: usize, size: usize) -> Result<()> {
        self.ensure_planning()?;
        let size = self.checked_size(size)?;
        let end = offset
            .checked_add(size)
            .ok_or(RuntimeError::NotLive { offset, size })?;

        let (block_start, block_size) = self
            .ledger
            .range(..=offset)
            .next_back()
            .map(|(&start, &len)| (start, len))
            .ok_or(RuntimeError::NotLive { offset, size })?;
        let block_end = block_start + block_size;

        if offset >= block_end {
            return Err(RuntimeError::NotLive { offset, size });
        }
        if end > block_end {
            return Err(RuntimeError::Overrun {
                offset,
                size,
                block_start,
                block_size,
            });
        }

        self.ledger.remove(&block_start);
        match (offset == block_start, end == block_end) {
            (true, true) => {
                if block_end == self.tail {
                    self.tail = block_start;
                }
            }
            (true, false) => {
                self.ledger.insert(end, block_end - end);
            }
            (false, true) => {
                self.ledger.insert(block_start, offset - block_start);
                if block_end == self.tail {
                    self.tail = offset;
                }
            }
            (false, false) => {
                self.ledger.insert(block_start, offset - block_start);
                self.ledger.insert(end, block_end - end);
            }
        }

        self.used -= size;
        Ok(())
    }

    /// Get the base address of the backing buffer, requesting it on first use.
    ///
    /// The runtime is asked for exactly `peak` bytes, once; later calls return
    /// the same address.
    pub fn materialize(&mut self) -> Result<DevicePtr> {
        if let Some(base) = self.base {
            return Ok(base);
        }
        let base = self.runtime.allocate(self.peak)?;
        tracing::info!(
            runtime = self.runtime.name(),
            %base,
            bytes = self.peak,
            "allocator materialized"
        );
        self.base = Some(base);
        Ok(base)
    }

    fn ensure_planning(&self) -> Result<()> {
        match self.base {
            Some(_) => Err(RuntimeError::AlreadyMaterialized),
            None => Ok(()),
        }
    }

    /// Bytes currently live.
    pub fn used(&self) -> usize {
        self.used
    }

    /// High-water mark of the address space.
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// End of the currently reserved address range.
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Alignment applied to every request.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Whether the backing buffer has been requested.
    pub fn is_materialized(&self) -> bool {
        self.base.is_some()
    }

    /// Live ranges in ascending offset order.
    pub fn live_ranges(&self) -> Vec<Range<usize>> {
        self.ledger
            .iter()
            .map(|(&start, &len)| start..start + len)
            .collect()
    }

    /// The runtime this allocator materializes on.
    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }
}

impl Drop for Allocator {
    fn drop(&mut self) {
        if let Some(base) = self.base.take() {
            self.runtime.release(base);
        }
    }
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("runtime", &self.runtime.name())
            .field("used", &self.used)
            .field("peak", &self.peak)
            .field("tail", &self.tail)
            .field("live", &self.ledger.len())
            .field("base", &self.base)
            .finish()
    }
}

impl fmt::Display for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Used memory: {}, peak memory: {}", self.used, self.peak)
    }
}
