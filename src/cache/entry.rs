// src/cache/entry.rs
//! The readiness coordinator for one cached response.
//!
//! A single producer (the thread that took a cache miss and is fetching from
//! upstream) appends chunks and eventually marks the entry complete, while
//! any number of subscribers (later requests for the same fingerprint) block
//! on the same condition variable until new bytes or completion are
//! published. This is the mechanism that turns N concurrent requests for an
//! uncached URL into one upstream fetch instead of N.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use super::message::ResponseMessage;

struct EntryState {
    message: ResponseMessage,
}

/// One cache slot's response buffer plus its readiness condition variable.
pub struct CacheEntry {
    state: Mutex<EntryState>,
    ready: Condvar,
    deleted: AtomicBool,
}

/// A snapshot returned to a subscriber: the bytes newly available since its
/// last cursor, whether the response is complete, and whether the entry has
/// been deleted out from under it.
pub struct EntrySnapshot {
    /// Bytes from the subscriber's cursor up to the entry's current length.
    pub bytes: Vec<u8>,
    /// Whether the producer has called [`CacheEntry::complete`].
    pub complete: bool,
    /// Whether the entry was deleted (evicted) while the subscriber waited.
    pub deleted: bool,
}

impl CacheEntry {
    /// Creates a new, empty, in-flight entry.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EntryState {
                message: ResponseMessage::empty(),
            }),
            ready: Condvar::new(),
            deleted: AtomicBool::new(false),
        }
    }

    /// Creates an entry already seeded with bytes (used when a full response
    /// is available up front, e.g. in tests).
    pub fn with_initial(initial: &[u8]) -> Self {
        Self {
            state: Mutex::new(EntryState {
                message: ResponseMessage::new(initial),
            }),
            ready: Condvar::new(),
            deleted: AtomicBool::new(false),
        }
    }

    /// Appends a chunk of upstream response bytes and wakes every blocked
    /// subscriber. Producer-only.
    pub fn append(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        guard.message.append(chunk);
        drop(guard);
        self.ready.notify_all();
    }

    /// Marks the response fully received and wakes every blocked subscriber.
    /// Producer-only, idempotent.
    pub fn complete(&self) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        guard.message.mark_complete();
        drop(guard);
        self.ready.notify_all();
    }

    /// Marks the entry deleted and wakes every blocked subscriber so they can
    /// stop waiting on a slot that will never receive more data.
    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
        self.ready.notify_all();
    }

    /// Whether the entry has been deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Returns immediately available bytes beyond `cursor`, without blocking.
    pub fn snapshot_from(&self, cursor: usize) -> EntrySnapshot {
        let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        EntrySnapshot {
            bytes: guard.message.bytes_from(cursor).unwrap_or(&[]).to_vec(),
            complete: guard.message.is_complete(),
            deleted: self.is_deleted(),
        }
    }

    /// Blocks until bytes are available past `cursor`, the response
    /// completes, or the entry is deleted — whichever happens first.
    ///
    /// Mirrors a `pthread_cond_wait` loop over `ready_cond`: the predicate is
    /// re-checked on every wake to guard against spurious wakeups.
    pub fn wait_for_more(&self, cursor: usize) -> EntrySnapshot {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if guard.message.len() > cursor
                || guard.message.is_complete()
                || self.is_deleted()
            {
                break;
            }
            guard = self
                .ready
                .wait(guard)
                .unwrap_or_else(|e| e.into_inner());
        }
        EntrySnapshot {
            bytes: guard.message.bytes_from(cursor).unwrap_or(&[]).to_vec(),
            complete: guard.message.is_complete(),
            deleted: self.is_deleted(),
        }
    }

    /// Total bytes currently buffered.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).message.len()
    }

    /// Whether the response has completed.
    pub fn is_complete(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .message
            .is_complete()
    }
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_append_then_snapshot() {
        let entry = CacheEntry::new();
        entry.append(b"hello");
        let snap = entry.snapshot_from(0);
        assert_eq!(snap.bytes, b"hello");
        assert!(!snap.complete);
        assert!(!snap.deleted);
    }

    #[test]
    fn test_wait_for_more_wakes_on_append() {
        let entry = Arc::new(CacheEntry::new());
        let producer = Arc::clone(&entry);
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            producer.append(b"chunk-one");
            producer.complete();
        });
        let snap = entry.wait_for_more(0);
        assert_eq!(snap.bytes, b"chunk-one");
        handle.join().unwrap();
        assert!(entry.is_complete());
    }

    #[test]
    fn test_fan_out_to_multiple_subscribers() {
        let entry = Arc::new(CacheEntry::new());
        let producer = Arc::clone(&entry);
        let producer_handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(10));
            producer.append(b"payload");
            producer.complete();
        });

        let mut subs = Vec::new();
        for _ in 0..5 {
            let e = Arc::clone(&entry);
            subs.push(thread::spawn(move || e.wait_for_more(0).bytes));
        }
        for s in subs {
            assert_eq!(s.join().unwrap(), b"payload");
        }
        producer_handle.join().unwrap();
    }

    #[test]
    fn test_delete_wakes_waiters() {
        let entry = Arc::new(CacheEntry::new());
        let deleter = Arc::clone(&entry);
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            deleter.mark_deleted();
        });
        let snap = entry.wait_for_more(0);
        assert!(snap.deleted);
        handle.join().unwrap();
    }
}
