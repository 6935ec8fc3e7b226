// src/cache/node.rs
//! Bucket-chain nodes.
//!
//! A per-cell locking discipline (a lock guards each link, not the whole
//! chain) built on `Arc<CacheNode>`: a node is only ever deallocated once its
//! last `Arc` clone is dropped, so a reader that cloned a node's `Arc` under
//! its predecessor's read lock can safely keep examining it after the
//! predecessor has moved on, even if a concurrent delete has already
//! unlinked it — no use-after-free hazard during hand-over-hand traversal.
//! `next` is itself an `RwLock<Option<Arc<CacheNode>>>` rather than a plain
//! pointer for the same reason a bucket head is: the *link* is mutated by
//! delete and add, so the link needs its own lock, not just the node.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use super::entry::CacheEntry;
use crate::fingerprint::Fingerprint;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// One bucket-chain link: a fingerprint, its readiness-coordinated entry, a
/// lock-free last-activity timestamp, and the link to the next node.
pub struct CacheNode {
    /// The cache key this node was inserted under.
    pub fingerprint: Fingerprint,
    /// The response buffer and readiness coordinator.
    pub entry: Arc<CacheEntry>,
    last_activity_ms: AtomicI64,
    /// The next node in this bucket's chain, or `None` at the tail.
    pub next: RwLock<Option<Arc<CacheNode>>>,
}

impl CacheNode {
    /// Creates a node for `fingerprint` wrapping a freshly built `entry`,
    /// stamped with the current time.
    pub fn new(fingerprint: Fingerprint, entry: Arc<CacheEntry>) -> Arc<Self> {
        Arc::new(Self {
            fingerprint,
            entry,
            last_activity_ms: AtomicI64::new(now_millis()),
            next: RwLock::new(None),
        })
    }

    /// Refreshes the node's last-activity stamp. Called on every cache hit so
    /// the expirer thread's idle-duration calculation stays accurate.
    ///
    /// Plain atomic store, not a lock, so a hot node under heavy concurrent
    /// `get` traffic is never write-locked just to bump a clock, and the
    /// expirer can read a node's age without locking it twice.
    pub fn touch(&self) {
        self.last_activity_ms.store(now_millis(), Ordering::Relaxed);
    }

    /// Milliseconds since this node's last successful `get`.
    pub fn idle_ms(&self) -> i64 {
        now_millis() - self.last_activity_ms.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_resets_idle() {
        let node = CacheNode::new(Fingerprint::from("k"), Arc::new(CacheEntry::new()));
        std::thread::sleep(std::time::Duration::from_millis(15));
        assert!(node.idle_ms() >= 15);
        node.touch();
        assert!(node.idle_ms() < 15);
    }

    #[test]
    fn test_chain_linking() {
        let a = CacheNode::new(Fingerprint::from("a"), Arc::new(CacheEntry::new()));
        let b = CacheNode::new(Fingerprint::from("b"), Arc::new(CacheEntry::new()));
        *a.next.write().unwrap() = Some(Arc::clone(&b));
        let next = a.next.read().unwrap();
        assert_eq!(next.as_ref().unwrap().fingerprint, Fingerprint::from("b"));
    }
}
