// tests/cache_and_pool_scenarios.rs
//! End-to-end scenarios for the response cache and worker pool: the scenarios
//! a reader would reach for to convince themselves the concurrency story
//! actually holds up, not just that individual methods return the right
//! value in isolation.

use cacheproxy::cache::{Cache, CacheEntry};
use cacheproxy::pool::WorkerPool;
use cacheproxy::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn e1_cache_miss_then_hit() {
    let cache = Cache::create(4, 60_000);
    let fp = Fingerprint::from("A");

    assert!(cache.get(&fp).is_none());

    cache.add(fp.clone(), Arc::new(CacheEntry::with_initial(b"payload")));

    let node = cache.get(&fp).expect("should now be present");
    assert_eq!(node.entry.snapshot_from(0).bytes, b"payload");
    assert!(node.idle_ms() < 10);

    cache.destroy();
}

#[test]
fn e2_collision_chain_survives_deletion() {
    let cache = Cache::create(1, 60_000); // single bucket: everything collides
    let a = Fingerprint::from("A");
    let b = Fingerprint::from("B");

    cache.add(a.clone(), Arc::new(CacheEntry::new()));
    cache.add(b.clone(), Arc::new(CacheEntry::new()));

    assert!(cache.get(&a).is_some());
    assert!(cache.get(&b).is_some());

    cache.delete(&a).unwrap();

    assert!(cache.get(&a).is_none());
    assert!(cache.get(&b).is_some());

    cache.destroy();
}

#[test]
fn e3_eviction_after_expiry() {
    let cache = Cache::create(2, 100);
    let fp = Fingerprint::from("X");
    cache.add(fp.clone(), Arc::new(CacheEntry::new()));

    assert!(cache.get(&fp).is_some());
    std::thread::sleep(Duration::from_millis(300));
    assert!(cache.get(&fp).is_none());

    cache.destroy();
}

#[test]
fn e4_readiness_fan_out_to_subscribers() {
    let entry = Arc::new(CacheEntry::new());

    let producer = Arc::clone(&entry);
    let producer_handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        producer.append(&[1u8; 10]);
        std::thread::sleep(Duration::from_millis(10));
        producer.append(&[2u8; 10]);
        producer.complete();
    });

    let mut subscribers = Vec::new();
    for _ in 0..3 {
        let entry = Arc::clone(&entry);
        subscribers.push(std::thread::spawn(move || {
            let mut received = Vec::new();
            let mut cursor = 0usize;
            loop {
                let snapshot = entry.wait_for_more(cursor);
                received.extend_from_slice(&snapshot.bytes);
                cursor += snapshot.bytes.len();
                if snapshot.complete {
                    break;
                }
            }
            received
        }));
    }

    for s in subscribers {
        let bytes = s.join().unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[..10], &[1u8; 10]);
        assert_eq!(&bytes[10..], &[2u8; 10]);
    }
    producer_handle.join().unwrap();
}

#[test]
fn e5_pool_backpressure_serializes_excess_work() {
    let pool = WorkerPool::create(1, 2);
    let start = Instant::now();
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let completed = Arc::clone(&completed);
        pool.submit(move || {
            std::thread::sleep(Duration::from_millis(100));
            completed.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.shutdown();

    assert_eq!(completed.load(Ordering::SeqCst), 5);
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[test]
fn e6_clean_shutdown_with_pending_work() {
    let pool = WorkerPool::create(2, 8);
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        let completed = Arc::clone(&completed);
        pool.submit(move || {
            std::thread::sleep(Duration::from_millis(50));
            completed.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    let start = Instant::now();
    pool.shutdown();

    assert_eq!(completed.load(Ordering::SeqCst), 4);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn get_or_create_collapses_concurrent_misses_to_one_fetch() {
    let cache = Arc::new(Cache::create(8, 60_000));
    let fp = Fingerprint::from("GET /shared HTTP/1.1");
    let fetch_count = Arc::new(AtomicUsize::new(0));

    std::thread::scope(|scope| {
        for _ in 0..20 {
            let cache = Arc::clone(&cache);
            let fp = fp.clone();
            let fetch_count = Arc::clone(&fetch_count);
            scope.spawn(move || {
                let (_node, is_new) = cache.get_or_create(fp, || {
                    fetch_count.fetch_add(1, Ordering::SeqCst);
                    Arc::new(CacheEntry::new())
                });
                let _ = is_new;
            });
        }
    });

    assert_eq!(fetch_count.load(Ordering::SeqCst), 1);
    cache.destroy();
}
