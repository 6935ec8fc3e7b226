// src/cache/mod.rs
//! The fingerprint-indexed response cache.
//!
//! A fixed-size bucket array, singly-linked per-bucket chains, a
//! multiplicative hash computed one byte at a time, and a background
//! garbage collector that walks every chain and evicts nodes idle past the
//! configured expiry. The `Arc`/`RwLock` hand-over-hand traversal discipline
//! lives in [`node`]; this module owns the bucket array, the hash function,
//! and the public `get`/`add`/`delete`/`get_or_create` operations plus the
//! expirer thread's lifecycle.

pub mod entry;
pub mod message;
pub mod node;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::utils::CachePadded;

pub use entry::{CacheEntry, EntrySnapshot};
pub use message::ResponseMessage;
pub use node::CacheNode;

use crate::fingerprint::Fingerprint;
use crate::proxy_error::{ProxyError, Result};

type Bucket = RwLock<Option<Arc<CacheNode>>>;

/// Running counters for cache operations, padded to avoid false sharing
/// between counters that different threads update independently (a hit
/// counter bumped by every reader vs. an eviction counter bumped only by the
/// expirer thread).
///
/// Uses the same `CachePadded<AtomicUsize>`-per-field layout as
/// [`crate::pool::fast`]'s internal stats for concurrently updated counters.
#[derive(Default)]
pub struct CacheStats {
    hits: CachePadded<std::sync::atomic::AtomicU64>,
    misses: CachePadded<std::sync::atomic::AtomicU64>,
    insertions: CachePadded<std::sync::atomic::AtomicU64>,
    evictions: CachePadded<std::sync::atomic::AtomicU64>,
    deletions: CachePadded<std::sync::atomic::AtomicU64>,
}

/// A point-in-time read of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStatsSnapshot {
    /// Successful lookups.
    pub hits: u64,
    /// Lookups for an absent fingerprint.
    pub misses: u64,
    /// Nodes inserted via `add`/`get_or_create`.
    pub insertions: u64,
    /// Nodes removed by the background expirer.
    pub evictions: u64,
    /// Nodes removed by an explicit `delete`.
    pub deletions: u64,
}

impl CacheStats {
    fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
        }
    }
}

/// Multiplicative string hash: `h = (h * 31 + byte) % capacity`, accumulated
/// one byte at a time with the modulus taken inside the loop to keep
/// intermediate values bounded.
pub fn hash(bytes: &[u8], capacity: usize) -> usize {
    debug_assert!(capacity > 0);
    let mut h: u64 = 0;
    for &b in bytes {
        h = (h.wrapping_mul(31).wrapping_add(b as u64)) % capacity as u64;
    }
    h as usize
}

/// The response cache: a fixed bucket array plus a background expirer.
pub struct Cache {
    buckets: Vec<Bucket>,
    capacity: usize,
    expiry_ms: u64,
    stats: Arc<CacheStats>,
    expirer_running: Arc<AtomicBool>,
    expirer_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Cache {
    /// Creates a cache with `capacity` buckets, evicting entries idle for
    /// more than `expiry_ms` milliseconds. Spawns the background expirer
    /// thread immediately.
    pub fn create(capacity: usize, expiry_ms: u64) -> Arc<Self> {
        let mut buckets = Vec::with_capacity(capacity.max(1));
        for _ in 0..capacity.max(1) {
            buckets.push(RwLock::new(None));
        }
        let cache = Arc::new(Self {
            buckets,
            capacity: capacity.max(1),
            expiry_ms,
            stats: Arc::new(CacheStats::default()),
            expirer_running: Arc::new(AtomicBool::new(true)),
            expirer_handle: Mutex::new(None),
        });
        let running = Arc::clone(&cache.expirer_running);
        let tick = Duration::from_millis((cache.expiry_ms / 2).min(1000).max(1));
        let handle = spawn_expirer(Arc::downgrade(&cache), running, tick);
        *cache.expirer_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        cache
    }

    fn bucket_index(&self, fingerprint: &Fingerprint) -> usize {
        hash(fingerprint.as_bytes(), self.capacity)
    }

    /// Looks up `fingerprint`, touching the node's activity stamp on a hit.
    ///
    /// Walks the bucket chain hand-over-hand: the lock on the current link is
    /// held only long enough to clone the `Arc` of the node it points to,
    /// then the next link's lock is taken and the previous one released.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<CacheNode>> {
        let idx = self.bucket_index(fingerprint);
        let mut current = {
            let head = self.buckets[idx].read().unwrap_or_else(|e| e.into_inner());
            head.clone()
        };
        while let Some(node) = current {
            if &node.fingerprint == fingerprint {
                node.touch();
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(node);
            }
            current = {
                let next = node.next.read().unwrap_or_else(|e| e.into_inner());
                next.clone()
            };
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Inserts `node` at the head of its bucket's chain, unconditionally.
    ///
    /// Mirrors `cache_add`'s prepend-then-publish: the new node's `next` is
    /// set to the current head before the bucket's head slot is swapped to
    /// point at it, so a concurrent reader never observes a node whose `next`
    /// is not yet initialized.
    pub fn add(&self, fingerprint: Fingerprint, entry: Arc<CacheEntry>) -> Arc<CacheNode> {
        let idx = self.bucket_index(&fingerprint);
        let node = CacheNode::new(fingerprint, entry);
        let mut head = self.buckets[idx].write().unwrap_or_else(|e| e.into_inner());
        *node.next.write().unwrap_or_else(|e| e.into_inner()) = head.clone();
        *head = Some(Arc::clone(&node));
        drop(head);
        self.stats.insertions.fetch_add(1, Ordering::Relaxed);
        node
    }

    /// Atomically looks up `fingerprint`, or inserts a fresh entry built from
    /// `make_entry` if absent, returning whether this call created it.
    ///
    /// `get` followed by a separate `add` on a miss (still available as
    /// `get`+`add`) has a window between the two calls where two concurrent
    /// misses on the same fingerprint both decide to fetch from upstream and
    /// both insert a node — the duplicate node silently shadows the first
    /// once it reaches the bucket head. This holds the bucket's write lock
    /// across the whole check-then-insert so at most one caller ever
    /// observes `is_new = true` for a given fingerprint.
    pub fn get_or_create<F>(&self, fingerprint: Fingerprint, make_entry: F) -> (Arc<CacheNode>, bool)
    where
        F: FnOnce() -> Arc<CacheEntry>,
    {
        let idx = self.bucket_index(&fingerprint);
        let mut head = self.buckets[idx].write().unwrap_or_else(|e| e.into_inner());

        let mut current = head.clone();
        while let Some(node) = current {
            if node.fingerprint == fingerprint {
                node.touch();
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return (node, false);
            }
            current = node.next.read().unwrap_or_else(|e| e.into_inner()).clone();
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let node = CacheNode::new(fingerprint, make_entry());
        *node.next.write().unwrap_or_else(|e| e.into_inner()) = head.clone();
        *head = Some(Arc::clone(&node));
        drop(head);
        self.stats.insertions.fetch_add(1, Ordering::Relaxed);
        (node, true)
    }

    /// Removes `fingerprint` from its bucket chain.
    ///
    /// Handles the head/non-head split: unlinking the head just swaps the
    /// bucket's head slot, while unlinking any other node requires locking
    /// its predecessor's `next` slot. Returns `NotFound` if the fingerprint
    /// isn't present.
    pub fn delete(&self, fingerprint: &Fingerprint) -> Result<()> {
        let idx = self.bucket_index(fingerprint);
        let mut head = self.buckets[idx].write().unwrap_or_else(|e| e.into_inner());

        if let Some(node) = head.clone() {
            if &node.fingerprint == fingerprint {
                *head = node.next.read().unwrap_or_else(|e| e.into_inner()).clone();
                drop(head);
                node.entry.mark_deleted();
                self.stats.deletions.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }
        drop(head);

        let mut prev = {
            let head = self.buckets[idx].read().unwrap_or_else(|e| e.into_inner());
            head.clone()
        };
        while let Some(prev_node) = prev {
            let mut next_slot = prev_node.next.write().unwrap_or_else(|e| e.into_inner());
            match next_slot.clone() {
                Some(candidate) if &candidate.fingerprint == fingerprint => {
                    *next_slot = candidate
                        .next
                        .read()
                        .unwrap_or_else(|e| e.into_inner())
                        .clone();
                    drop(next_slot);
                    candidate.entry.mark_deleted();
                    self.stats.deletions.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Some(_) => {
                    let next = next_slot.clone();
                    drop(next_slot);
                    prev = next;
                }
                None => return Err(ProxyError::NotFound),
            }
        }
        Err(ProxyError::NotFound)
    }

    /// A snapshot of the running counters.
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of buckets in the array.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shuts down the background expirer and blocks until it has stopped.
    ///
    /// The expirer's sleep ticks are at most one second (see
    /// [`spawn_expirer`]), so a plain `join` after flipping the running flag
    /// returns within one tick without ever blocking indefinitely.
    pub fn destroy(&self) {
        self.expirer_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self
            .expirer_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        self.expirer_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self
            .expirer_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = handle.join();
        }
    }
}

/// Takes a `Weak` reference rather than an owning `Arc`: if the expirer held
/// a strong reference, the cache's strong count could never reach zero
/// while the thread was alive, and `Drop for Cache` would never run.
/// Upgrading once per tick lets the thread notice the cache is gone and
/// exit on its own.
fn spawn_expirer(
    cache: std::sync::Weak<Cache>,
    running: Arc<AtomicBool>,
    tick: Duration,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("cache-expirer".into())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(tick);
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                expire_pass(&cache);
            }
        })
        .expect("failed to spawn cache expirer thread")
}

fn expire_pass(cache: &Cache) {
    let expiry_ms = cache.expiry_ms as i64;
    for idx in 0..cache.buckets.len() {
        loop {
            let mut head = cache.buckets[idx]
                .write()
                .unwrap_or_else(|e| e.into_inner());
            let Some(node) = head.clone() else { break };
            if node.idle_ms() >= expiry_ms {
                *head = node.next.read().unwrap_or_else(|e| e.into_inner()).clone();
                drop(head);
                node.entry.mark_deleted();
                cache.stats.evictions.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            drop(head);
            break;
        }

        let mut prev = {
            let head = cache.buckets[idx]
                .read()
                .unwrap_or_else(|e| e.into_inner());
            head.clone()
        };
        while let Some(prev_node) = prev {
            let mut next_slot = prev_node
                .next
                .write()
                .unwrap_or_else(|e| e.into_inner());
            let Some(candidate) = next_slot.clone() else {
                break;
            };
            if candidate.idle_ms() >= expiry_ms {
                *next_slot = candidate
                    .next
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                drop(next_slot);
                candidate.entry.mark_deleted();
                cache.stats.evictions.fetch_add(1, Ordering::Relaxed);
                prev = Some(prev_node);
                continue;
            }
            drop(next_slot);
            prev = Some(candidate);
        }
    }
}
