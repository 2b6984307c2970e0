//! End-to-end behavior of the pool allocator, driven through the public
//! `allocate` / `free` / `reset` surface only (plus `stats` to observe which
//! strategy served a request).

use pool_alloc::{BucketPolicy, PoolAllocator, PoolError};
use pool_units::{ByteOffset, PoolGeometry};

const UNIT: u64 = 256;

fn pool(pages: u32, blocks_per_page: u32, depth_limit: u32) -> PoolAllocator {
    PoolAllocator::new(
        PoolGeometry::new(pages, blocks_per_page, 256),
        BucketPolicy::uniform(8, depth_limit),
    )
}

#[test]
fn live_allocations_never_overlap() {
    let mut pool = pool(4, 8, 2);
    let mut live: Vec<(u64, u64)> = Vec::new();

    // Deterministic xorshift drive; sizes 1..=4 blocks.
    let mut state = 0x9E37_79B9_7F4A_7C15_u64;
    let mut rand = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    for _ in 0..2_000 {
        if live.is_empty() || rand() % 3 != 0 {
            let bytes = (rand() % 4 + 1) * UNIT;
            match pool.allocate(bytes) {
                Ok(offset) => {
                    let start = offset.as_u64();
                    assert_eq!(start % UNIT, 0, "unaligned offset");
                    for &(other, len) in &live {
                        let disjoint = start + bytes <= other || other + len <= start;
                        assert!(disjoint, "runs overlap: {start}+{bytes} vs {other}+{len}");
                    }
                    live.push((start, bytes));
                }
                Err(PoolError::OutOfMemory) => {
                    // Legitimate under fragmentation; free something below.
                    assert!(!live.is_empty(), "empty pool reported out of memory");
                }
                Err(other) => panic!("unexpected error {other}"),
            }
        } else {
            let victim = rand() as usize % live.len();
            let (start, _) = live.swap_remove(victim);
            pool.free(ByteOffset::new(start)).unwrap();
        }
    }
}

#[test]
fn round_trip_restores_the_balance() {
    let mut pool = pool(2, 8, 2);
    let keeper = pool.allocate(UNIT).unwrap();
    let before = pool.outstanding();

    let offset = pool.allocate(3 * UNIT).unwrap();
    assert_eq!(pool.outstanding(), before + 3);
    pool.free(offset).unwrap();
    assert_eq!(pool.outstanding(), before);

    pool.free(keeper).unwrap();
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn double_free_is_rejected() {
    let mut pool = pool(2, 8, 2);
    let keeper = pool.allocate(UNIT).unwrap();
    let offset = pool.allocate(2 * UNIT).unwrap();
    pool.free(offset).unwrap();
    assert_eq!(pool.free(offset), Err(PoolError::InvalidOffset(offset)));
    // The keeper is untouched by the failed free.
    assert_eq!(pool.outstanding(), 1);
    let _ = keeper;
}

#[test]
fn buckets_serve_exact_lengths_first() {
    let mut pool = pool(2, 8, 2);
    let two = pool.allocate(2 * UNIT).unwrap();
    let three = pool.allocate(3 * UNIT).unwrap();
    pool.allocate(UNIT).unwrap();

    pool.free(two).unwrap();
    pool.free(three).unwrap();
    assert_eq!(pool.stats().listed_runs, 2);

    // Each request is served by its own bucket, regardless of free order.
    assert_eq!(pool.allocate(3 * UNIT).unwrap(), three);
    assert_eq!(pool.stats().listed_runs, 1);
    assert_eq!(pool.allocate(2 * UNIT).unwrap(), two);
    assert_eq!(pool.stats().listed_runs, 0);
}

#[test]
fn exhaustion_reports_out_of_memory() {
    let mut pool = pool(2, 4, 2);
    pool.allocate(4 * UNIT).unwrap();
    pool.allocate(4 * UNIT).unwrap();
    assert_eq!(pool.allocate(UNIT), Err(PoolError::OutOfMemory));
}

#[test]
fn reset_is_idempotent_and_restores_a_fresh_pool() {
    let mut pool = pool(2, 4, 2);
    pool.reset();
    pool.reset();
    assert_eq!(pool.outstanding(), 0);

    let offset = pool.allocate(2 * UNIT).unwrap();
    assert_eq!(offset.as_u64(), 0);
    pool.allocate(UNIT).unwrap();
    pool.reset();

    // Everything is gone; allocation starts over at the region base.
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.stats().allocated_blocks, 0);
    assert_eq!(pool.allocate(2 * UNIT).unwrap().as_u64(), 0);
}

/// The recorder team's acceptance walkthrough: sixteen 256 B blocks, bucket
/// retention of two.
#[test]
fn recorded_walkthrough() {
    let mut pool = pool(2, 8, 2);

    let first = pool.allocate(3 * UNIT).unwrap();
    assert_eq!(first.as_u64(), 0);

    let second = pool.allocate(2 * UNIT).unwrap();
    assert_eq!(second.as_u64(), 768);

    pool.free(first).unwrap();
    assert_eq!(pool.stats().listed_runs, 1);

    // Exactly three blocks again: served from the bucket, while the bump
    // cursor stays parked at block five.
    let reused = pool.allocate(3 * UNIT).unwrap();
    assert_eq!(reused.as_u64(), 0);
    assert_eq!(pool.stats().bump_page, 0);
    assert_eq!(pool.stats().bump_used, 5);

    // Twenty blocks exceed both the region and a single page.
    assert_eq!(pool.allocate(20 * UNIT), Err(PoolError::OutOfMemory));
}

/// A run that does not fit the current page's remainder moves to the next
/// page whole; the remainder is skipped, not split.
#[test]
fn bump_advances_to_the_next_page() {
    let mut pool = pool(4, 4, 2);

    assert_eq!(pool.allocate(3 * UNIT).unwrap().as_u64(), 0);
    // One block remains on page 0; a two-block run lands on page 1.
    assert_eq!(pool.allocate(2 * UNIT).unwrap().as_u64(), 1024);
    assert_eq!(pool.stats().bump_page, 1);
    assert_eq!(pool.stats().bump_used, 2);
}

/// The remainder skipped by a page advance is not lost: once the cursor is
/// spent, the full scan finds it.
#[test]
fn scan_reclaims_skipped_remainders() {
    let mut pool = pool(2, 4, 0);
    pool.allocate(3 * UNIT).unwrap(); // blocks 0..3, block 3 skipped next
    pool.allocate(4 * UNIT).unwrap(); // page 1 whole
    assert_eq!(pool.allocate(UNIT).unwrap().as_u64(), 768);
}

/// With retention off (the shipped policy) a freed run is not reused while
/// never-used space remains; with retention on it is reused immediately.
#[test]
fn retention_policy_changes_reuse() {
    let mut zero = pool(1, 8, 0);
    let a = zero.allocate(2 * UNIT).unwrap();
    zero.allocate(2 * UNIT).unwrap();
    zero.free(a).unwrap();
    assert_eq!(zero.stats().listed_runs, 0);
    assert_eq!(zero.allocate(2 * UNIT).unwrap().as_u64(), 1024);

    let mut keep = pool(1, 8, 1);
    let a = keep.allocate(2 * UNIT).unwrap();
    keep.allocate(2 * UNIT).unwrap();
    keep.free(a).unwrap();
    assert_eq!(keep.stats().listed_runs, 1);
    assert_eq!(keep.allocate(2 * UNIT).unwrap(), a);
}

/// Freeing into the middle of a run releases the residual tail; freeing the
/// head afterwards over-counts and trips the drain-reset, which discards
/// every allocation. Blunt, but it is the leak recovery the recorder relies
/// on after an unbalanced client.
#[test]
fn over_free_triggers_leak_recovery() {
    let mut pool = pool(2, 4, 0);
    pool.allocate(3 * UNIT).unwrap(); // blocks 0..3
    let bystander = pool.allocate(UNIT).unwrap(); // block 3
    assert_eq!(pool.outstanding(), 4);

    // Mid-run free at block 1: the residual says two blocks.
    pool.free(ByteOffset::new(256)).unwrap();
    assert_eq!(pool.outstanding(), 2);

    // Now the head: its run length of three drives the balance negative.
    pool.free(ByteOffset::new(0)).unwrap();
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.stats().allocated_blocks, 0);

    // The bystander went down with the reset.
    assert_eq!(
        pool.free(bystander),
        Err(PoolError::InvalidOffset(bystander))
    );
    assert_eq!(pool.allocate(UNIT).unwrap().as_u64(), 0);
}
