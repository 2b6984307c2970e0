//! # Block Table
//!
//! The authoritative, O(1)-indexable record of every block unit's state.
//!
//! One [`BlockEntry`] exists per block index. Besides the block's fixed byte
//! offset it carries a single packed metadata word, [`BlockMeta`]:
//!
//! - `run`: at the head of an allocated or free-listed run, the run length
//!   in blocks; on the tail of an allocated run, a decreasing residual; zero
//!   on blocks that head nothing (including *invisible* free blocks, which
//!   only the full scan can discover).
//! - `link`: the free-list successor while this block heads a listed run,
//!   stored as index plus one so that zero means "no link".
//! - `allocated`: set while the block belongs to a live allocation.
//!
//! ## Invariants
//!
//! - An allocated run `[h, h+n)` has `allocated` set throughout, `run == n`
//!   at `h` and `run == n-k` at `h+k`. The residuals are written during
//!   allocation and read by nothing but a free that lands mid-run; they also
//!   keep a listed run's tail opaque to the full scan after the run is freed.
//! - A block heads at most one free-list entry at a time.
//! - `offset` is fixed at creation and only ever rewritten by [`BlockTable::reset`].

use alloc::vec::Vec;
use bitfield_struct::bitfield;
use pool_units::{BlockIndex, ByteOffset, PoolGeometry};

/// Packed per-block metadata word.
#[bitfield(u64)]
pub struct BlockMeta {
    /// Run length at a head; decreasing residual on an allocated tail;
    /// zero everywhere else.
    #[bits(24)]
    run: u32,
    /// Free-list successor as index + 1; zero means unlinked.
    #[bits(24)]
    link: u32,
    /// Set while the block belongs to a live allocation.
    allocated: bool,
    #[bits(15)]
    __: u16,
}

/// State of one block unit.
#[derive(Copy, Clone)]
pub struct BlockEntry {
    offset: ByteOffset,
    meta: BlockMeta,
}

impl BlockEntry {
    fn at(geometry: PoolGeometry, index: BlockIndex) -> Self {
        Self {
            offset: geometry.offset_of(index),
            meta: BlockMeta::new(),
        }
    }

    /// Byte offset of this block from the region start.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> ByteOffset {
        self.offset
    }

    /// Run length or residual; see the module docs for the exact meaning.
    #[inline]
    #[must_use]
    pub const fn run(&self) -> u32 {
        self.meta.run()
    }

    #[inline]
    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.meta.allocated()
    }

    /// Free-list successor, when this block heads a listed run.
    #[inline]
    #[must_use]
    pub const fn next(&self) -> Option<BlockIndex> {
        match self.meta.link() {
            0 => None,
            raw => Some(BlockIndex::new(raw - 1)),
        }
    }

    #[inline]
    pub const fn set_run(&mut self, run: u32) {
        self.meta.set_run(run);
    }

    #[inline]
    pub const fn set_next(&mut self, next: Option<BlockIndex>) {
        self.meta.set_link(match next {
            None => 0,
            Some(index) => index.as_u32() + 1,
        });
    }

    #[inline]
    const fn set_allocated(&mut self, allocated: bool) {
        self.meta.set_allocated(allocated);
    }

    /// Free, and invisible to everything but the full scan.
    #[inline]
    #[must_use]
    pub const fn is_free_unlisted(&self) -> bool {
        !self.meta.allocated() && self.meta.run() == 0
    }
}

/// Flat table of [`BlockEntry`] values spanning the whole region.
pub struct BlockTable {
    geometry: PoolGeometry,
    entries: Vec<BlockEntry>,
}

impl BlockTable {
    #[must_use]
    pub fn new(geometry: PoolGeometry) -> Self {
        let entries = (0..geometry.total_blocks())
            .map(|i| BlockEntry::at(geometry, BlockIndex::new(i)))
            .collect();
        Self { geometry, entries }
    }

    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> PoolGeometry {
        self.geometry
    }

    /// Look up one entry.
    ///
    /// Externally supplied offsets must pass [`PoolGeometry::block_of`]
    /// before reaching this; indices produced internally are in range by
    /// construction (debug-asserted).
    #[inline]
    #[must_use]
    pub fn entry(&self, index: BlockIndex) -> &BlockEntry {
        debug_assert!(index.as_u32() < self.geometry.total_blocks());
        &self.entries[index.as_usize()]
    }

    #[inline]
    #[must_use]
    pub fn entry_mut(&mut self, index: BlockIndex) -> &mut BlockEntry {
        debug_assert!(index.as_u32() < self.geometry.total_blocks());
        &mut self.entries[index.as_usize()]
    }

    /// Mark `[head, head+n)` as one allocated run.
    ///
    /// Writes `n` at the head and the decreasing residual on the tail.
    pub fn mark_run_allocated(&mut self, head: BlockIndex, n: u32) {
        debug_assert!(n > 0);
        debug_assert!(head.as_u32() + n <= self.geometry.total_blocks());
        for k in 0..n {
            let entry = self.entry_mut(head + k);
            entry.set_allocated(true);
            entry.set_run(n - k);
        }
    }

    /// Mark `[head, head+n)` free and drop any free-list links.
    ///
    /// Run lengths are left alone; whether they stay (listed run) or get
    /// zeroed (invisible run) is the caller's decision.
    pub fn mark_run_free(&mut self, head: BlockIndex, n: u32) {
        debug_assert!(head.as_u32() + n <= self.geometry.total_blocks());
        for k in 0..n {
            let entry = self.entry_mut(head + k);
            entry.set_allocated(false);
            entry.set_next(None);
        }
    }

    /// Zero the run lengths of `[head, head+n)`, making the space invisible
    /// to the buckets and discoverable only by the full scan.
    pub fn clear_runs(&mut self, head: BlockIndex, n: u32) {
        debug_assert!(head.as_u32() + n <= self.geometry.total_blocks());
        for k in 0..n {
            self.entry_mut(head + k).set_run(0);
        }
    }

    /// Count of blocks currently marked allocated.
    #[must_use]
    pub fn allocated_blocks(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let count = self.entries.iter().filter(|e| e.is_allocated()).count() as u32;
        count
    }

    /// Reinitialize every entry to its creation state.
    pub fn reset(&mut self) {
        let geometry = self.geometry;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let index = BlockIndex::new(i as u32);
            *entry = BlockEntry::at(geometry, index);
        }
    }
}
