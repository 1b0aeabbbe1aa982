#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use veneer_types::{MethodId, Ty, TypeDefKind, TypePool};

use super::{CacheKey, ProxyCache};
use crate::error::SynthesisError;
use crate::facade::{synthesize_type, ProxyOptions, ProxyTypeRequest};
use crate::synthesized::TypeHandle;

fn plain(pool: &TypePool, name: &str) -> Result<TypeHandle, SynthesisError> {
    synthesize_type(pool, &ProxyTypeRequest::new(name, Ty::Object), true)
}

fn empty_key() -> CacheKey {
    CacheKey::for_interfaces(Vec::new(), ProxyOptions::default())
}

#[test]
fn key_normalizes_interface_order_and_duplicates() {
    let mut pool = TypePool::new();
    let a = Ty::Named(pool.define_type("IA", TypeDefKind::Interface));
    let b = Ty::Named(pool.define_type("IB", TypeDefKind::Interface));
    let options = ProxyOptions::default();

    let left = CacheKey::new(Ty::Object, [a.clone(), b.clone(), a.clone()], Vec::new(), options);
    let right = CacheKey::new(Ty::Object, [b.clone(), a.clone()], Vec::new(), options);
    assert_eq!(left, right);
    assert_eq!(left.interfaces().len(), 2);

    let intercepting = CacheKey::new(Ty::Object, [a, b], [MethodId::new(7)], options);
    assert_ne!(left, intercepting);
}

#[test]
fn concurrent_requests_for_one_key_synthesize_once() {
    let pool = TypePool::new();
    let cache = ProxyCache::new();
    let key = empty_key();
    let calls = AtomicUsize::new(0);
    let barrier = Barrier::new(2);

    let handles: Vec<TypeHandle> = thread::scope(|s| {
        let workers: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache
                        .get_or_synthesize(&key, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            plain(&pool, "Shared")
                        })
                        .unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&handles[0], &handles[1]));
    assert_eq!(cache.len(), 1);
}

#[test]
fn distinct_keys_synthesize_independently() {
    let mut pool = TypePool::new();
    let iface = Ty::Named(pool.define_type("IA", TypeDefKind::Interface));
    let cache = ProxyCache::new();
    let first = empty_key();
    let second = CacheKey::for_interfaces([iface], ProxyOptions::default());

    let a = cache.get_or_synthesize(&first, || plain(&pool, "A")).unwrap();
    let b = cache.get_or_synthesize(&second, || plain(&pool, "B")).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(cache.len(), 2);
}

#[test]
fn in_flight_key_does_not_block_other_keys() {
    let mut pool = TypePool::new();
    let iface = Ty::Named(pool.define_type("IA", TypeDefKind::Interface));
    let cache = ProxyCache::new();
    let slow = empty_key();
    let fast = CacheKey::for_interfaces([iface], ProxyOptions::default());
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let (pool, cache) = (&pool, &cache);

    let (slow_result, fast_result) = thread::scope(|s| {
        let slow_worker = s.spawn(move || {
            cache.get_or_synthesize(&slow, move || {
                started_tx.send(()).unwrap();
                // Only returns once the other key has been synthesized
                // while this one is still in flight.
                done_rx
                    .recv_timeout(Duration::from_secs(5))
                    .expect("other key was blocked by the in-flight one");
                plain(pool, "Slow")
            })
        });
        started_rx.recv().unwrap();
        let fast_worker = s.spawn(move || {
            let result = cache.get_or_synthesize(&fast, || plain(pool, "Fast"));
            done_tx.send(()).unwrap();
            result
        });
        (slow_worker.join().unwrap(), fast_worker.join().unwrap())
    });

    assert!(!Arc::ptr_eq(&slow_result.unwrap(), &fast_result.unwrap()));
    assert_eq!(cache.len(), 2);
}

#[test]
fn failures_are_cached() {
    let cache = ProxyCache::new();
    let key = empty_key();
    let failure = SynthesisError::InvalidProxyTarget {
        ty: "object".to_owned(),
        reason: "test failure",
    };

    let first = cache.get_or_synthesize(&key, || Err(failure.clone()));
    let second = cache.get_or_synthesize(&key, || unreachable!("result is cached"));
    assert_eq!(first.unwrap_err(), failure);
    assert_eq!(second.unwrap_err(), failure);
    assert_eq!(cache.get(&key).map(|r| r.is_err()), Some(true));
}

#[test]
fn get_does_not_synthesize() {
    let cache = ProxyCache::new();
    let key = empty_key();
    assert!(cache.get(&key).is_none());
    assert!(cache.is_empty());
}
