//! # Fixed-Region Block Pool Allocator
//!
//! This crate implements the block allocator at the heart of the media
//! recording pipeline: a fixed region of physically backed pages, carved into
//! equally sized block units, serving variable-length contiguous runs to the
//! recording path.
//!
//! ## Architecture Overview
//!
//! An allocation request walks three strategies in order; the first hit wins:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Free-List Bucket Manager               │
//! │    • size-bucketed lists of freed runs              │
//! │    • exact-length match, O(1) / O(bucket depth)     │
//! │    • per-bucket retention caps                      │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ miss
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 Bump Cursor                         │
//! │    • monotonic cursor through never-used space      │
//! │    • advances pagewise, never reclaims              │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ miss
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 Full Scan                           │
//! │    • circular walk from a rotating anchor           │
//! │    • finds freed space the buckets let go of        │
//! │    • a full fruitless wrap means out of memory      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! All three strategies operate on one flat [block table](block_table) that
//! records, per block unit, whether it is allocated, the length of the run it
//! heads, and its free-list link. Runs never straddle a backing page: pages
//! are acquired independently, so only blocks within one page are physically
//! contiguous.
//!
//! ## Reclamation
//!
//! Freed runs are offered to the bucket manager. A bucket below its retention
//! cap keeps the run for exact-length reuse; otherwise the run becomes
//! *invisible*: its run lengths are zeroed and only the full scan can find
//! the space again. The shipped [`BucketPolicy`] sets every cap to zero, so
//! in production every free takes the invisible path.
//!
//! ## Locking
//!
//! The allocator never synchronizes internally. Callers either hold an
//! exclusive borrow or go through [`SharedPool`], which wraps the allocator
//! in a [`pool_sync::SpinLock`]. One lock covers the whole pool: runs can
//! cross bucket and cursor state, so there is nothing to shard.
//!
//! ## Failure Modes
//!
//! Exactly two, both synchronous and typed: [`PoolError::OutOfMemory`] when
//! all three strategies miss, and [`PoolError::InvalidOffset`] for a free of
//! an unaligned, out-of-range, or not-currently-allocated offset. One
//! implicit recovery behavior exists: a free that drives the outstanding
//! block counter to zero or below resets the entire pool (see
//! [`PoolAllocator::free`]).

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod block_table;
pub mod buckets;
pub mod bump;
pub mod pool;
pub mod scan;
pub mod shared;

pub use buckets::BucketPolicy;
pub use pool::{PoolAllocator, PoolError, PoolStats};
pub use shared::SharedPool;
