//! # Full Scan
//!
//! Last-resort discovery of contiguous free space anywhere in the region.
//! The scan only sees blocks that are free *and unlisted* (allocated flag
//! clear, run length zero): space still held in a free-list bucket keeps a
//! non-zero run length on every block and is skipped, so a listed run can
//! never be handed out twice.
//!
//! The walk is circular, at most one lap, and starts at a rotating anchor
//! that is pushed past every successful hit. Rotating the start spreads scan
//! pressure round-robin over the region instead of hammering its low end.

use pool_units::{BlockIndex, PoolGeometry};

use crate::block_table::BlockTable;

/// Rotating start position for the circular scan.
///
/// Created at the region midpoint; a reset puts it back there.
#[derive(Copy, Clone, Debug)]
pub struct ScanAnchor {
    book_mark: u32,
}

impl ScanAnchor {
    #[must_use]
    pub const fn new(geometry: PoolGeometry) -> Self {
        Self {
            book_mark: geometry.midpoint().as_u32(),
        }
    }

    /// Where the next scan will start.
    #[inline]
    #[must_use]
    pub const fn book_mark(&self) -> BlockIndex {
        BlockIndex::new(self.book_mark)
    }

    /// Find and claim `n` contiguous free-and-unlisted blocks.
    ///
    /// The run counter resets when the walk enters a new page (runs must not
    /// straddle independently backed pages) and on every block that is not
    /// free-and-unlisted. A full lap without a hit returns `None`; that is
    /// the allocator's final failure mode.
    pub fn find(&mut self, table: &mut BlockTable, n: u32) -> Option<BlockIndex> {
        let geometry = table.geometry();
        let total = geometry.total_blocks();
        if n == 0 || n > geometry.blocks_per_page() {
            return None;
        }

        debug_assert!(self.book_mark < total);
        let mut index = self.book_mark;
        let mut run = 0_u32;
        for _ in 0..total {
            let block = BlockIndex::new(index);
            if geometry.is_page_start(block) {
                run = 0;
            }
            if table.entry(block).is_free_unlisted() {
                run += 1;
            } else {
                run = 0;
            }
            if run == n {
                // The run never crosses a page start, so the head is simply
                // n - 1 blocks back.
                let head = BlockIndex::new(index + 1 - n);
                table.mark_run_allocated(head, n);
                self.book_mark = (index + 1) % total;
                return Some(head);
            }
            index = (index + 1) % total;
        }
        None
    }

    pub const fn reset(&mut self, geometry: PoolGeometry) {
        self.book_mark = geometry.midpoint().as_u32();
    }
}
