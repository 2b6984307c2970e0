//! # Shared Pool
//!
//! The allocator behind the one lock its contract demands. The device layer
//! keeps a single [`SharedPool`] for the region and calls it from every
//! handle; the whole pool is one critical section because runs cross bucket
//! and cursor state freely.

use pool_sync::SpinLock;
use pool_units::ByteOffset;

use crate::pool::{PoolAllocator, PoolError, PoolStats};

/// A [`PoolAllocator`] wrapped in a [`SpinLock`].
pub struct SharedPool {
    inner: SpinLock<PoolAllocator>,
}

impl SharedPool {
    #[must_use]
    pub const fn new(pool: PoolAllocator) -> Self {
        Self {
            inner: SpinLock::new(pool),
        }
    }

    /// See [`PoolAllocator::allocate`].
    ///
    /// # Errors
    /// [`PoolError::OutOfMemory`] when the pool cannot satisfy the request.
    pub fn allocate(&self, bytes: u64) -> Result<ByteOffset, PoolError> {
        self.inner.with_lock(|pool| pool.allocate(bytes))
    }

    /// See [`PoolAllocator::free`].
    ///
    /// # Errors
    /// [`PoolError::InvalidOffset`] when `offset` does not name a live run.
    pub fn free(&self, offset: ByteOffset) -> Result<(), PoolError> {
        self.inner.with_lock(|pool| pool.free(offset))
    }

    /// See [`PoolAllocator::reset`].
    pub fn reset(&self) {
        self.inner.with_lock(PoolAllocator::reset);
    }

    /// Reset only when nothing is outstanding. The device layer calls this
    /// when the last handle closes; a pool with live allocations is left
    /// alone and `false` is returned.
    pub fn reset_if_idle(&self) -> bool {
        self.inner.with_lock(|pool| {
            if pool.outstanding() == 0 {
                pool.reset();
                true
            } else {
                false
            }
        })
    }

    #[must_use]
    pub fn outstanding(&self) -> i64 {
        self.inner.with_lock(|pool| pool.outstanding())
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner.with_lock(|pool| pool.stats())
    }

    /// Run several operations under one lock acquisition.
    pub fn with_pool<R>(&self, f: impl FnOnce(&mut PoolAllocator) -> R) -> R {
        self.inner.with_lock(f)
    }
}
