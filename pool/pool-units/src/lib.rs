//! # Block and Byte Units for the Media Pool
//!
//! Strongly typed wrappers for the units the pool allocator deals in, plus
//! the geometry that relates them.
//!
//! ## Overview
//!
//! The pool is a fixed region of physically backed pages, each page carved
//! into equally sized block units. Callers address memory by byte offset from
//! the region start; the allocator reasons in block indices. Mixing the two
//! (or mixing block and page indices) is a classic source of off-by-a-factor
//! bugs, so each unit gets its own zero-cost wrapper:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`BlockIndex`] | Index of one block unit within the whole region. |
//! | [`PageIndex`] | Index of one backing page. |
//! | [`ByteOffset`] | Byte distance from the region start, as handed to callers. |
//! | [`PoolGeometry`] | The region shape: pages × blocks/page × block unit size. |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use pool_units::*;
//! let geo = PoolGeometry::new(4, 8, 256);
//!
//! // Block 11 lives in page 1 and starts 2816 bytes into the region.
//! let block = BlockIndex::new(11);
//! assert_eq!(geo.page_of(block), PageIndex::new(1));
//! assert_eq!(geo.offset_of(block), ByteOffset::new(2816));
//!
//! // Offsets convert back only when aligned and in range.
//! assert_eq!(geo.block_of(ByteOffset::new(2816)), Some(block));
//! assert_eq!(geo.block_of(ByteOffset::new(2817)), None);
//! ```
//!
//! ## Design Notes
//!
//! - The wrappers are `#[repr(transparent)]` and implement `Copy`, `Eq`,
//!   `Ord`, and `Hash`, so they work as map keys and cost nothing at runtime.
//! - [`PoolGeometry`] is plain data fixed at pool creation. All conversions
//!   are `const fn` where the language allows.
//! - [`PoolGeometry::block_of`] is the single place an externally supplied
//!   offset is checked for alignment and range; everything downstream may
//!   then index tables directly.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

use core::fmt;
use core::ops::{Add, AddAssign};

/// Index of a single block unit within the region.
///
/// Valid values are `0..total_blocks` for the [`PoolGeometry`] at hand; the
/// type itself does not carry the bound.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct BlockIndex(u32);

impl BlockIndex {
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Return the index as `usize` for table access.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {}", self.0)
    }
}

impl Add<u32> for BlockIndex {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for BlockIndex {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

/// Index of a single backing page within the region.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PageIndex(u32);

impl PageIndex {
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}", self.0)
    }
}

/// Byte distance from the region start.
///
/// This is the only unit that crosses the allocator boundary: callers receive
/// offsets from `allocate` and pass them back to `free`. An offset returned
/// by the allocator is always a multiple of the block unit size.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ByteOffset(u64);

impl ByteOffset {
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ByteOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteOffset(0x{:08X})", self.0)
    }
}

impl fmt::Display for ByteOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl Add<u64> for ByteOffset {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl From<u64> for ByteOffset {
    #[inline]
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<ByteOffset> for u64 {
    #[inline]
    fn from(value: ByteOffset) -> Self {
        value.as_u64()
    }
}

/// The region shape: `page_count` pages, each holding `blocks_per_page`
/// block units of `block_unit` bytes.
///
/// ### Invariants
/// - All three fields are non-zero (debug-asserted at construction).
/// - `total_blocks = page_count * blocks_per_page` fits in `u32`;
///   `total_bytes` fits in `u64`.
///
/// A run of blocks is only physically contiguous within one backing page, so
/// geometry-aware callers must never let a run straddle a page boundary.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PoolGeometry {
    page_count: u32,
    blocks_per_page: u32,
    block_unit: u32,
}

impl PoolGeometry {
    /// Shipped configuration: 40 pages of 64 blocks, 32 KiB per block
    /// (an 80 MiB pool).
    #[inline]
    #[must_use]
    pub const fn shipped() -> Self {
        Self::new(40, 64, 32 * 1024)
    }

    /// Create a geometry.
    ///
    /// ### Debug assertions
    /// - All fields non-zero.
    /// - The block count does not overflow `u32`.
    #[inline]
    #[must_use]
    pub const fn new(page_count: u32, blocks_per_page: u32, block_unit: u32) -> Self {
        debug_assert!(page_count > 0, "pool needs at least one page");
        debug_assert!(blocks_per_page > 0, "page needs at least one block");
        debug_assert!(block_unit > 0, "block unit must be non-zero");
        debug_assert!(page_count.checked_mul(blocks_per_page).is_some());
        Self {
            page_count,
            blocks_per_page,
            block_unit,
        }
    }

    #[inline]
    #[must_use]
    pub const fn page_count(self) -> u32 {
        self.page_count
    }

    #[inline]
    #[must_use]
    pub const fn blocks_per_page(self) -> u32 {
        self.blocks_per_page
    }

    /// Size of one block unit in bytes.
    #[inline]
    #[must_use]
    pub const fn block_unit(self) -> u32 {
        self.block_unit
    }

    /// Number of block units in the whole region.
    #[inline]
    #[must_use]
    pub const fn total_blocks(self) -> u32 {
        self.page_count * self.blocks_per_page
    }

    /// Size of the whole region in bytes.
    #[inline]
    #[must_use]
    pub const fn total_bytes(self) -> u64 {
        self.total_blocks() as u64 * self.block_unit as u64
    }

    /// Byte offset of the given block from the region start.
    ///
    /// ### Debug assertions
    /// - `block` is in range.
    #[inline]
    #[must_use]
    pub const fn offset_of(self, block: BlockIndex) -> ByteOffset {
        debug_assert!(block.as_u32() < self.total_blocks());
        ByteOffset::new(block.as_u32() as u64 * self.block_unit as u64)
    }

    /// The block starting at `offset`, or `None` when the offset is not
    /// block-aligned or lies outside the region.
    ///
    /// This is the validation gate for externally supplied offsets; anything
    /// that passes may be used for direct table indexing.
    #[inline]
    #[must_use]
    pub fn block_of(self, offset: ByteOffset) -> Option<BlockIndex> {
        let raw = offset.as_u64();
        let unit = u64::from(self.block_unit);
        if raw % unit != 0 {
            return None;
        }
        let index = raw / unit;
        if index >= u64::from(self.total_blocks()) {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        Some(BlockIndex::new(index as u32))
    }

    /// The page containing the given block.
    #[inline]
    #[must_use]
    pub const fn page_of(self, block: BlockIndex) -> PageIndex {
        PageIndex::new(block.as_u32() / self.blocks_per_page)
    }

    /// Whether `block` is the first block of its page.
    #[inline]
    #[must_use]
    pub const fn is_page_start(self, block: BlockIndex) -> bool {
        block.as_u32() % self.blocks_per_page == 0
    }

    /// The first block of the given page.
    #[inline]
    #[must_use]
    pub const fn first_block(self, page: PageIndex) -> BlockIndex {
        BlockIndex::new(page.as_u32() * self.blocks_per_page)
    }

    /// The block at the middle of the region. Used as the creation-time (and
    /// post-reset) starting point of the rotating scan anchor.
    #[inline]
    #[must_use]
    pub const fn midpoint(self) -> BlockIndex {
        BlockIndex::new(self.total_blocks() / 2)
    }

    /// How many whole blocks `bytes` covers (truncating division).
    #[inline]
    #[must_use]
    pub const fn blocks_for(self, bytes: u64) -> u64 {
        bytes / self.block_unit as u64
    }
}

impl fmt::Display for PoolGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages x {} blocks x {} B",
            self.page_count, self.blocks_per_page, self.block_unit
        )
    }
}
