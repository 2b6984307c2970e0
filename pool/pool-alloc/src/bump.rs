//! # Bump Cursor
//!
//! Fast-path allocation from never-used space: a monotonic cursor walking
//! the region page by page. When a request does not fit the current page's
//! remainder the cursor moves to the next page and the remainder is skipped
//! for good; skipped space is only recoverable through free and the full
//! scan, never through the cursor.

use pool_units::BlockIndex;

use crate::block_table::BlockTable;

/// Monotonic `(page, used)` cursor. Only a reset moves it backwards.
#[derive(Copy, Clone, Default, Debug)]
pub struct BumpCursor {
    page: u32,
    used: u32,
}

impl BumpCursor {
    #[must_use]
    pub const fn new() -> Self {
        Self { page: 0, used: 0 }
    }

    /// Current page of the cursor.
    #[inline]
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Blocks already handed out of the current page.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> u32 {
        self.used
    }

    /// Carve a run of `n` blocks out of never-used space.
    ///
    /// Runs must not straddle a page (pages are acquired independently, so
    /// contiguity ends at the page boundary); a request larger than one page
    /// never takes this path. `None` means the fast path is exhausted, not
    /// the whole allocator.
    pub fn bump(&mut self, table: &mut BlockTable, n: u32) -> Option<BlockIndex> {
        let geometry = table.geometry();
        if n == 0 || n > geometry.blocks_per_page() {
            return None;
        }
        if n > geometry.blocks_per_page() - self.used {
            if self.page + 1 >= geometry.page_count() {
                return None;
            }
            self.page += 1;
            self.used = 0;
        }
        let head = BlockIndex::new(self.page * geometry.blocks_per_page() + self.used);
        self.used += n;
        table.mark_run_allocated(head, n);
        Some(head)
    }

    pub const fn reset(&mut self) {
        self.page = 0;
        self.used = 0;
    }
}
