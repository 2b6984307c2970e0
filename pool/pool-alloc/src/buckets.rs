//! # Free-List Bucket Manager
//!
//! Retains recently freed runs for exact-length reuse, with a configured cap
//! on how much is retained per run length.
//!
//! Bucket `b` holds runs of exactly `b + 1` blocks; the last bucket is the
//! overflow bucket and holds every longer run, matched by its stored length.
//! Lists are intrusive and index-based: the successor of a listed run lives
//! in its head block's `link` word in the block table, so the manager itself
//! is just the list heads and depth counters.
//!
//! Matching is exact-length only. A bucket never serves a shorter request
//! than the run it holds and the overflow bucket never serves a best-fit
//! larger run; predictable O(1) / O(depth) cost is worth more here than
//! fragmentation tolerance.

use alloc::vec;
use alloc::vec::Vec;
use pool_units::BlockIndex;

use crate::block_table::BlockTable;

/// Per-bucket retention caps.
///
/// The shipped policy sets every cap to zero: freed runs are never retained
/// and always fall through to the invisible / full-scan path. Field reports
/// traced recorder stalls to stale retained runs fragmenting the region,
/// and zero retention has been the production setting since.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BucketPolicy {
    depth_limits: Vec<u32>,
}

impl BucketPolicy {
    /// Shipped configuration: sixteen buckets, all retention off.
    #[must_use]
    pub fn shipped() -> Self {
        Self::uniform(16, 0)
    }

    /// `bucket_count` buckets sharing one depth limit.
    #[must_use]
    pub fn uniform(bucket_count: usize, depth_limit: u32) -> Self {
        Self::new(vec![depth_limit; bucket_count])
    }

    /// One depth limit per bucket; the last bucket is the overflow bucket.
    #[must_use]
    pub fn new(depth_limits: Vec<u32>) -> Self {
        debug_assert!(
            depth_limits.len() >= 2,
            "need at least one sized bucket and the overflow bucket"
        );
        Self { depth_limits }
    }

    #[inline]
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.depth_limits.len()
    }

    #[inline]
    fn limit(&self, bucket: usize) -> u32 {
        self.depth_limits[bucket]
    }
}

/// The bucket lists themselves.
pub struct FreeListBuckets {
    policy: BucketPolicy,
    heads: Vec<Option<BlockIndex>>,
    depths: Vec<u32>,
}

impl FreeListBuckets {
    #[must_use]
    pub fn new(policy: BucketPolicy) -> Self {
        let count = policy.bucket_count();
        Self {
            policy,
            heads: vec![None; count],
            depths: vec![0; count],
        }
    }

    /// Bucket index for a run of `n` blocks; lengths past the sized buckets
    /// collapse onto the overflow bucket.
    #[inline]
    fn bucket_for(&self, n: u32) -> usize {
        debug_assert!(n > 0);
        (n as usize).min(self.policy.bucket_count()) - 1
    }

    #[inline]
    fn overflow(&self) -> usize {
        self.policy.bucket_count() - 1
    }

    /// Take a run of exactly `n` blocks, if one is listed.
    ///
    /// Sized buckets pop their head; the overflow bucket is walked for the
    /// first run whose stored length matches. The returned run is marked
    /// allocated in the table before the head index is handed back.
    pub fn take(&mut self, table: &mut BlockTable, n: u32) -> Option<BlockIndex> {
        debug_assert!(n > 0);
        let bucket = self.bucket_for(n);
        if bucket < self.overflow() {
            let head = self.heads[bucket]?;
            self.heads[bucket] = table.entry(head).next();
            table.entry_mut(head).set_next(None);
            self.depths[bucket] -= 1;
            table.mark_run_allocated(head, n);
            return Some(head);
        }

        // Overflow: unlink the first exact-length run, if any.
        let mut previous: Option<BlockIndex> = None;
        let mut current = self.heads[bucket];
        while let Some(index) = current {
            let next = table.entry(index).next();
            if table.entry(index).run() == n {
                match previous {
                    None => self.heads[bucket] = next,
                    Some(prev) => table.entry_mut(prev).set_next(next),
                }
                table.entry_mut(index).set_next(None);
                self.depths[bucket] -= 1;
                table.mark_run_allocated(index, n);
                return Some(index);
            }
            previous = current;
            current = next;
        }
        None
    }

    /// Offer a freed run of `n` blocks headed at `head`.
    ///
    /// Returns `true` when the run was listed; `false` when its bucket is at
    /// its retention cap, in which case the caller must make the run
    /// invisible (zero its run lengths).
    pub fn put(&mut self, table: &mut BlockTable, head: BlockIndex, n: u32) -> bool {
        let bucket = self.bucket_for(n);
        if self.depths[bucket] >= self.policy.limit(bucket) {
            return false;
        }
        let entry = table.entry_mut(head);
        entry.set_run(n);
        entry.set_next(self.heads[bucket]);
        self.heads[bucket] = Some(head);
        self.depths[bucket] += 1;
        true
    }

    /// Drop all lists and depth counters. Table state is the caller's to fix.
    pub fn clear(&mut self) {
        self.heads.fill(None);
        self.depths.fill(0);
    }

    /// Number of runs currently listed across all buckets.
    #[must_use]
    pub fn listed_runs(&self) -> u32 {
        self.depths.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_units::PoolGeometry;

    fn table() -> BlockTable {
        // One page of 16 blocks keeps page boundaries out of the way.
        BlockTable::new(PoolGeometry::new(1, 16, 256))
    }

    /// Allocate-then-free a run so it is in the state `put` expects.
    fn freed_run(table: &mut BlockTable, head: u32, n: u32) -> BlockIndex {
        let head = BlockIndex::new(head);
        table.mark_run_allocated(head, n);
        table.mark_run_free(head, n);
        head
    }

    #[test]
    fn zero_capacity_refuses_everything() {
        let mut table = table();
        let mut buckets = FreeListBuckets::new(BucketPolicy::shipped());
        let head = freed_run(&mut table, 0, 3);
        assert!(!buckets.put(&mut table, head, 3));
        assert_eq!(buckets.listed_runs(), 0);
        assert_eq!(buckets.take(&mut table, 3), None);
    }

    #[test]
    fn sized_bucket_serves_exact_length_only() {
        let mut table = table();
        let mut buckets = FreeListBuckets::new(BucketPolicy::uniform(8, 2));
        let head = freed_run(&mut table, 0, 3);
        assert!(buckets.put(&mut table, head, 3));
        assert_eq!(buckets.listed_runs(), 1);

        // Shorter and longer requests miss.
        assert_eq!(buckets.take(&mut table, 2), None);
        assert_eq!(buckets.take(&mut table, 4), None);

        let taken = buckets.take(&mut table, 3).unwrap();
        assert_eq!(taken, head);
        assert_eq!(buckets.listed_runs(), 0);
        assert!(table.entry(head).is_allocated());
        assert_eq!(table.entry(head).run(), 3);
        // Popped again: empty.
        assert_eq!(buckets.take(&mut table, 3), None);
    }

    #[test]
    fn sized_bucket_is_lifo() {
        let mut table = table();
        let mut buckets = FreeListBuckets::new(BucketPolicy::uniform(8, 4));
        let first = freed_run(&mut table, 0, 2);
        let second = freed_run(&mut table, 4, 2);
        assert!(buckets.put(&mut table, first, 2));
        assert!(buckets.put(&mut table, second, 2));

        assert_eq!(buckets.take(&mut table, 2), Some(second));
        assert_eq!(buckets.take(&mut table, 2), Some(first));
    }

    #[test]
    fn depth_cap_is_enforced_per_bucket() {
        let mut table = table();
        let mut buckets = FreeListBuckets::new(BucketPolicy::uniform(8, 1));
        let first = freed_run(&mut table, 0, 2);
        let second = freed_run(&mut table, 4, 2);
        let other_size = freed_run(&mut table, 8, 3);

        assert!(buckets.put(&mut table, first, 2));
        assert!(!buckets.put(&mut table, second, 2), "bucket is full");
        // A different bucket still has room.
        assert!(buckets.put(&mut table, other_size, 3));
    }

    #[test]
    fn overflow_bucket_matches_stored_length() {
        let mut table = table();
        // Four buckets: lengths 1..=3 sized, >= 4 in overflow.
        let mut buckets = FreeListBuckets::new(BucketPolicy::uniform(4, 4));
        let five = freed_run(&mut table, 0, 5);
        let four = freed_run(&mut table, 6, 4);
        let six = freed_run(&mut table, 10, 6);
        assert!(buckets.put(&mut table, four, 4));
        assert!(buckets.put(&mut table, five, 5));
        assert!(buckets.put(&mut table, six, 6));
        assert_eq!(buckets.listed_runs(), 3);

        // Mid-list unlink: the 5-run sits between the 6-run and the 4-run.
        assert_eq!(buckets.take(&mut table, 5), Some(five));
        assert_eq!(buckets.listed_runs(), 2);
        // No 5-run left; no best-fit from the 6-run.
        assert_eq!(buckets.take(&mut table, 5), None);
        assert_eq!(buckets.take(&mut table, 4), Some(four));
        assert_eq!(buckets.take(&mut table, 6), Some(six));
        assert_eq!(buckets.listed_runs(), 0);
    }

    #[test]
    fn clear_empties_all_buckets() {
        let mut table = table();
        let mut buckets = FreeListBuckets::new(BucketPolicy::uniform(8, 4));
        let head = freed_run(&mut table, 0, 2);
        assert!(buckets.put(&mut table, head, 2));
        buckets.clear();
        assert_eq!(buckets.listed_runs(), 0);
        assert_eq!(buckets.take(&mut table, 2), None);
    }
}
