//! # Allocator Façade
//!
//! [`PoolAllocator`] owns the whole region state (block table, buckets, bump
//! cursor, scan anchor) and orchestrates the three-tier allocation strategy,
//! frees, and resets.
//!
//! Every operation requires external mutual exclusion for its whole
//! duration: an `&mut` borrow, or the spin lock offered by
//! [`SharedPool`](crate::shared::SharedPool). Operations never block and
//! never run longer than one full table scan.

use log::{debug, trace};
use pool_units::{ByteOffset, PoolGeometry};

use crate::block_table::BlockTable;
use crate::buckets::{BucketPolicy, FreeListBuckets};
use crate::bump::BumpCursor;
use crate::scan::ScanAnchor;

/// The two ways a pool operation can fail.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PoolError {
    /// Every allocation strategy missed.
    #[error("out of pool memory")]
    OutOfMemory,
    /// The offset is unaligned, out of range, or does not refer to a live
    /// allocation (double free).
    #[error("invalid offset {0}")]
    InvalidOffset(ByteOffset),
}

/// Point-in-time counters, mainly for instrumentation and tests.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PoolStats {
    /// Block units in the whole region.
    pub total_blocks: u32,
    /// Block units currently part of a live allocation.
    pub allocated_blocks: u32,
    /// Freed runs currently retained in buckets.
    pub listed_runs: u32,
    /// Page the bump cursor sits on.
    pub bump_page: u32,
    /// Blocks the bump cursor has handed out of that page.
    pub bump_used: u32,
}

/// The fixed-region block pool allocator.
pub struct PoolAllocator {
    table: BlockTable,
    buckets: FreeListBuckets,
    cursor: BumpCursor,
    anchor: ScanAnchor,
    /// Signed so that over-freeing (a mid-run free followed by the head's)
    /// is observable; at or below zero the pool resets itself.
    outstanding: i64,
}

impl PoolAllocator {
    #[must_use]
    pub fn new(geometry: PoolGeometry, policy: BucketPolicy) -> Self {
        Self {
            table: BlockTable::new(geometry),
            buckets: FreeListBuckets::new(policy),
            cursor: BumpCursor::new(),
            anchor: ScanAnchor::new(geometry),
            outstanding: 0,
        }
    }

    /// The shipped configuration: 80 MiB region, retention off.
    #[must_use]
    pub fn shipped() -> Self {
        Self::new(PoolGeometry::shipped(), BucketPolicy::shipped())
    }

    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> PoolGeometry {
        self.table.geometry()
    }

    /// Net outstanding blocks (allocated minus freed).
    #[inline]
    #[must_use]
    pub const fn outstanding(&self) -> i64 {
        self.outstanding
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total_blocks: self.geometry().total_blocks(),
            allocated_blocks: self.table.allocated_blocks(),
            listed_runs: self.buckets.listed_runs(),
            bump_page: self.cursor.page(),
            bump_used: self.cursor.used(),
        }
    }

    /// Allocate `bytes` of contiguous pool memory.
    ///
    /// `bytes` must be a positive multiple of the block unit size; the
    /// device layer on top guarantees this and it is debug-asserted here.
    /// Strategies are tried in order: exact-length bucket reuse, the bump
    /// cursor, the full scan. The returned offset is block-aligned.
    ///
    /// # Errors
    /// [`PoolError::OutOfMemory`] when all three strategies miss. Requests
    /// longer than one page can never be satisfied (runs must not straddle
    /// independently backed pages) and fail the same way.
    pub fn allocate(&mut self, bytes: u64) -> Result<ByteOffset, PoolError> {
        let geometry = self.geometry();
        debug_assert!(
            bytes > 0 && bytes % u64::from(geometry.block_unit()) == 0,
            "size must be a positive multiple of the block unit"
        );
        let n = geometry.blocks_for(bytes);
        if n == 0 || n > u64::from(geometry.blocks_per_page()) {
            return Err(PoolError::OutOfMemory);
        }
        #[allow(clippy::cast_possible_truncation)]
        let n = n as u32;

        let head = self
            .buckets
            .take(&mut self.table, n)
            .or_else(|| self.cursor.bump(&mut self.table, n))
            .or_else(|| self.anchor.find(&mut self.table, n))
            .ok_or(PoolError::OutOfMemory)?;

        self.outstanding += i64::from(n);
        let offset = geometry.offset_of(head);
        trace!("allocated {n} blocks at {offset}, {} outstanding", self.outstanding);
        Ok(offset)
    }

    /// Release the run starting at `offset`.
    ///
    /// The freed run is offered to the buckets; when its bucket is at its
    /// retention cap the run lengths are zeroed instead, leaving the space
    /// discoverable only by the full scan.
    ///
    /// A free that brings the outstanding counter to zero or below performs
    /// a full [`reset`](Self::reset) instead of an incremental free. For a
    /// balanced caller that is merely the cheapest possible "everything is
    /// free again"; for an unbalanced one it doubles as leak recovery,
    /// trading all retained state for a defragmented region.
    ///
    /// # Errors
    /// [`PoolError::InvalidOffset`] when `offset` is not block-aligned, out
    /// of range, or not the address of a live block (double free).
    pub fn free(&mut self, offset: ByteOffset) -> Result<(), PoolError> {
        let Some(head) = self.geometry().block_of(offset) else {
            return Err(PoolError::InvalidOffset(offset));
        };
        let entry = self.table.entry(head);
        if !entry.is_allocated() {
            return Err(PoolError::InvalidOffset(offset));
        }
        let n = entry.run();
        debug_assert!(n > 0, "allocated block without a run length");

        self.outstanding -= i64::from(n);
        if self.outstanding <= 0 {
            debug!(
                "pool drained ({} outstanding after freeing {n} blocks), resetting",
                self.outstanding
            );
            self.reset();
            return Ok(());
        }

        self.table.mark_run_free(head, n);
        if !self.buckets.put(&mut self.table, head, n) {
            self.table.clear_runs(head, n);
            trace!("bucket full, {n} blocks at {offset} left for the scan");
        }
        Ok(())
    }

    /// Return the pool to its creation state: table reinitialized, buckets
    /// emptied, bump cursor on the first page, scan anchor at the region
    /// midpoint, outstanding counter zero. Idempotent.
    pub fn reset(&mut self) {
        let geometry = self.geometry();
        self.table.reset();
        self.buckets.clear();
        self.cursor.reset();
        self.anchor.reset(geometry);
        self.outstanding = 0;
        debug!("pool reset ({geometry})");
    }
}
