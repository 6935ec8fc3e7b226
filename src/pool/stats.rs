// src/pool/stats.rs
//! Point-in-time statistics snapshots for both buffer pool implementations.

/// A snapshot of [`super::standard::BufferPool`] counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers currently idle in the pool.
    pub available: usize,
    /// Total buffers ever freshly allocated (pool misses).
    pub total_allocated: usize,
    /// Total `acquire()` calls ever made.
    pub total_acquired: usize,
    /// Total buffers ever returned to the pool.
    pub total_returned: usize,
    /// Capacity, in bytes, given to each buffer.
    pub buffer_size: usize,
    /// Configured upper bound on idle buffers.
    pub max_pool_size: usize,
}

impl PoolStats {
    /// Buffers currently checked out (acquired but not yet returned).
    pub fn in_use(&self) -> usize {
        self.total_acquired.saturating_sub(self.total_returned)
    }

    /// Percentage of acquisitions served from the idle pool rather than via
    /// a fresh allocation.
    pub fn hit_rate(&self) -> f64 {
        if self.total_acquired == 0 {
            return 0.0;
        }
        let hits = self.total_acquired.saturating_sub(self.total_allocated);
        (hits as f64 / self.total_acquired as f64) * 100.0
    }
}

/// A snapshot of [`super::fast::FastBufferPool`] counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastPoolStats {
    /// Buffers currently idle in the global lock-free queue.
    pub available: usize,
    /// Total buffers ever freshly allocated.
    pub allocated: usize,
    /// Total `acquire()` calls ever made.
    pub acquired: usize,
    /// Total buffers ever returned (to either tier).
    pub returned: usize,
    /// Acquisitions served from a thread-local cache.
    pub cache_hits: usize,
    /// Buffers lost on thread exit before the thread-local cleanup was
    /// introduced. Always zero; kept for API stability, see
    /// [`super::fast::FastBufferPool::stats`].
    pub thread_local_lost: usize,
}

impl FastPoolStats {
    /// Percentage of acquisitions served from a thread-local cache.
    pub fn cache_hit_rate(&self) -> f64 {
        if self.acquired == 0 {
            return 0.0;
        }
        (self.cache_hits as f64 / self.acquired as f64) * 100.0
    }

    /// Percentage of acquisitions served from either cache tier (thread-local
    /// or global) rather than a fresh allocation.
    pub fn pool_hit_rate(&self) -> f64 {
        if self.acquired == 0 {
            return 0.0;
        }
        let hits = self.acquired.saturating_sub(self.allocated);
        (hits as f64 / self.acquired as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_use_and_hit_rate() {
        let stats = PoolStats {
            available: 5,
            total_allocated: 2,
            total_acquired: 10,
            total_returned: 8,
            buffer_size: 4096,
            max_pool_size: 100,
        };
        assert_eq!(stats.in_use(), 2);
        assert_eq!(stats.hit_rate(), 80.0);
    }

    #[test]
    fn test_fast_hit_rates() {
        let stats = FastPoolStats {
            available: 3,
            allocated: 1,
            acquired: 10,
            returned: 9,
            cache_hits: 6,
            thread_local_lost: 0,
        };
        assert_eq!(stats.cache_hit_rate(), 60.0);
        assert_eq!(stats.pool_hit_rate(), 90.0);
    }
}
