// src/pool/config.rs
//! Shared sizing configuration for both buffer pool implementations.

/// Sizing parameters for [`super::standard::BufferPool`] and
/// [`super::fast::FastBufferPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Capacity, in bytes, given to every freshly allocated buffer.
    pub buffer_size: usize,
    /// Upper bound on idle buffers kept around for reuse.
    pub max_pool_size: usize,
    /// Number of buffers pre-allocated when the pool is created.
    pub min_pool_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer_size: 4096,
            max_pool_size: 256,
            min_pool_size: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.buffer_size, 4096);
        assert!(config.min_pool_size <= config.max_pool_size);
    }
}
