use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Barrier,
    },
    thread,
    time::{Duration, Instant},
};

use fetch_coordinator::{CacheEntry, CacheKey, CoordinatorConfig, FetchCoordinator, FetchResult};
use pretty_assertions::assert_eq;

fn threaded() -> FetchCoordinator {
    FetchCoordinator::new(CoordinatorConfig::default()).expect("coordinator")
}

#[test]
fn late_joiner_shares_the_first_retrieval() {
    let coordinator = threaded();
    let calls = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let first = {
        let calls = Arc::clone(&calls);
        coordinator.subscribe("A", move |_: &CacheKey| {
            calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Ok(b"payload-a".to_vec())
        })
    };
    thread::sleep(Duration::from_millis(10));
    let second = {
        let calls = Arc::clone(&calls);
        coordinator.subscribe("A", move |_: &CacheKey| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(b"should not run".to_vec())
        })
    };

    let first = first.wait();
    let second = second.wait();
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);
    let entry = first.entry().expect("loaded");
    assert_eq!(entry.bytes(), b"payload-a");
    assert!(entry.ptr_eq(second.entry().expect("loaded")));
    assert_eq!(coordinator.stats().coalesced, 1);
}

#[test]
fn concurrent_requests_trigger_one_retrieval() {
    const CALLERS: usize = 8;

    let coordinator = threaded();
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles = (0..CALLERS)
        .map(|_| {
            let coordinator = coordinator.clone();
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                coordinator.request("shared", move |_: &CacheKey| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(30));
                    Ok(vec![7; 64])
                })
            })
        })
        .collect::<Vec<_>>();

    let results = handles
        .into_iter()
        .map(|handle| handle.join().expect("caller thread"))
        .collect::<Vec<_>>();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first = results[0].entry().expect("loaded");
    for result in &results {
        assert!(result.entry().expect("loaded").ptr_eq(first));
    }
    let stats = coordinator.stats();
    assert_eq!(stats.requests, CALLERS as u64);
    assert_eq!(stats.retrievals_started, 1);
    assert_eq!(stats.coalesced + stats.cache_hits, CALLERS as u64 - 1);
}

#[test]
fn waiters_on_a_gated_retrieval_all_coalesce() {
    const WAITERS: usize = 5;

    let coordinator = threaded();
    let (release, gate) = mpsc::channel::<()>();
    let gate = Arc::new(parking_lot::Mutex::new(gate));

    let subscriptions = (0..WAITERS)
        .map(|_| {
            let gate = Arc::clone(&gate);
            coordinator.subscribe("gated", move |_: &CacheKey| {
                gate.lock().recv().map_err(|err| err.to_string())?;
                Ok(b"released".to_vec())
            })
        })
        .collect::<Vec<_>>();

    assert_eq!(coordinator.in_flight_count(), 1);
    assert!(subscriptions.iter().all(|s| !s.is_finished()));
    assert_eq!(coordinator.stats().coalesced, WAITERS as u64 - 1);

    release.send(()).expect("release retrieval");
    for subscription in &subscriptions {
        assert_eq!(
            subscription.wait(),
            FetchResult::Success(CacheEntry::new(b"released".to_vec()))
        );
    }
    assert_eq!(coordinator.in_flight_count(), 0);
    assert_eq!(coordinator.stats().retrievals_started, 1);
}

#[test]
fn distinct_keys_retrieve_independently() {
    let coordinator = threaded();
    let calls = Arc::new(AtomicUsize::new(0));

    let subscriptions = ["a", "b", "c"]
        .into_iter()
        .map(|key| {
            let calls = Arc::clone(&calls);
            coordinator.subscribe(key, move |key: &CacheKey| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(key.as_str().as_bytes().to_vec())
            })
        })
        .collect::<Vec<_>>();

    for subscription in &subscriptions {
        let result = subscription.wait();
        assert_eq!(
            result.entry().expect("loaded").bytes(),
            subscription.key().as_str().as_bytes()
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(coordinator.cache().len(), 3);
}
