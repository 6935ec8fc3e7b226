// src/config.rs
//! Environment-variable configuration.
//!
//! Reads `CLIENT_HANDLER_COUNT` and `CACHE_EXPIRED_TIME_MS`, plus one
//! additive knob, `BUFFER_POOL_KIND`, selecting which of the two buffer pool
//! implementations backs per-connection scratch buffers.

use std::str::FromStr;

/// Which buffer pool implementation backs per-connection scratch buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPoolKind {
    /// `crate::pool::BufferPool` — a single mutex guarding a `Vec<Buffer>`.
    Standard,
    /// `crate::pool::FastBufferPool` — thread-local cache over a lock-free
    /// global queue.
    Fast,
}

impl Default for BufferPoolKind {
    fn default() -> Self {
        BufferPoolKind::Standard
    }
}

/// Proxy-wide configuration, assembled from the environment with sensible
/// defaults when a variable is absent or unparseable.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Number of worker pool executor threads (`CLIENT_HANDLER_COUNT`).
    pub executor_count: usize,
    /// Cache entry expiry, in milliseconds (`CACHE_EXPIRED_TIME_MS`).
    pub expiry_ms: u64,
    /// Number of buckets in the response cache.
    pub cache_capacity: usize,
    /// Worker pool task queue depth.
    pub queue_capacity: usize,
    /// Which buffer pool implementation to use for connection scratch
    /// buffers (`BUFFER_POOL_KIND`, one of `standard`/`fast`).
    pub buffer_pool_kind: BufferPoolKind,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            executor_count: 8,
            expiry_ms: 60_000,
            cache_capacity: 1024,
            queue_capacity: 256,
            buffer_pool_kind: BufferPoolKind::default(),
        }
    }
}

impl ProxyConfig {
    /// Builds a configuration from environment variables, logging a warning
    /// and falling back to the default for any variable that is present but
    /// fails to parse as a positive integer.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(count) = read_positive_env("CLIENT_HANDLER_COUNT") {
            config.executor_count = count as usize;
        }
        if let Some(ms) = read_positive_env("CACHE_EXPIRED_TIME_MS") {
            config.expiry_ms = ms;
        }
        if let Ok(raw) = std::env::var("BUFFER_POOL_KIND") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "standard" => config.buffer_pool_kind = BufferPoolKind::Standard,
                "fast" => config.buffer_pool_kind = BufferPoolKind::Fast,
                other => {
                    crate::log!(
                        "BUFFER_POOL_KIND={:?} not recognized, defaulting to standard",
                        other
                    );
                }
            }
        }

        config
    }
}

fn read_positive_env(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match u64::from_str(raw.trim()) {
        Ok(value) if value > 0 => Some(value),
        Ok(_) => {
            crate::log!("{} must be positive, ignoring value {:?}", name, raw);
            None
        }
        Err(_) => {
            crate::log!("{} value {:?} is not a valid integer, using default", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_sane() {
        let config = ProxyConfig::default();
        assert!(config.executor_count > 0);
        assert!(config.expiry_ms > 0);
        assert_eq!(config.buffer_pool_kind, BufferPoolKind::Standard);
    }
}
