use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use fetch_coordinator::{
    CacheEntry, CacheKey, DeferredExecutor, FetchCoordinator, FetchError, FetchErrorKind,
    FetchResult, ResourceState,
};
use pretty_assertions::assert_eq;

fn deferred() -> (FetchCoordinator, DeferredExecutor) {
    let executor = DeferredExecutor::default();
    let coordinator = FetchCoordinator::builder()
        .executor(Arc::new(executor.clone()))
        .build()
        .expect("coordinator");
    (coordinator, executor)
}

#[test]
fn cancelling_one_waiter_leaves_the_others_untouched() {
    let (coordinator, executor) = deferred();
    let key = CacheKey::from("shared");

    let keep = coordinator.subscribe(key.clone(), |_: &CacheKey| Ok(vec![1, 2, 3]));
    let leave = coordinator.subscribe(key.clone(), |_: &CacheKey| Ok(vec![9]));

    assert!(leave.cancel());
    assert!(!leave.cancel());
    assert_eq!(
        leave.wait(),
        FetchResult::Failure(FetchError::Cancelled { key: key.clone() })
    );
    assert_eq!(keep.state(), ResourceState::Loading);

    executor.run_pending();
    assert_eq!(keep.wait().entry().map(|e| e.bytes().to_vec()), Some(vec![1, 2, 3]));
    assert_eq!(
        leave.try_result().and_then(|r| r.error().map(FetchError::kind)),
        Some(FetchErrorKind::Cancelled)
    );
    assert_eq!(coordinator.stats().cancellations, 1);
}

#[test]
fn retrieval_with_no_waiters_left_still_populates_the_cache() {
    let (coordinator, executor) = deferred();
    let key = CacheKey::from("orphan");
    let callbacks = Arc::new(AtomicUsize::new(0));

    let subscriptions = (0..3)
        .map(|_| {
            let callbacks = Arc::clone(&callbacks);
            coordinator.request_with(
                key.clone(),
                |_: &CacheKey| Ok(b"late".to_vec()),
                move |_| {
                    callbacks.fetch_add(1, Ordering::SeqCst);
                },
            )
        })
        .collect::<Vec<_>>();
    for subscription in &subscriptions {
        assert!(subscription.cancel());
    }

    assert_eq!(coordinator.state(&key), ResourceState::Loading);
    assert_eq!(executor.run_pending(), 1);

    assert_eq!(callbacks.load(Ordering::SeqCst), 0);
    assert_eq!(
        coordinator.cache().get(&key).map(|e| e.bytes().to_vec()),
        Some(b"late".to_vec())
    );
    assert_eq!(coordinator.in_flight_count(), 0);
}

#[test]
fn cancel_after_resolution_is_a_no_op() {
    let (coordinator, executor) = deferred();
    let subscription = coordinator.subscribe("done", |_: &CacheKey| Ok(vec![5]));
    executor.run_pending();

    assert!(!subscription.cancel());
    assert!(subscription.wait().is_success());
    assert_eq!(coordinator.stats().cancellations, 0);
}

#[test]
fn request_timeout_gives_up_while_the_retrieval_finishes() {
    let coordinator = FetchCoordinator::builder().build().expect("coordinator");
    let (release, gate) = mpsc::channel::<()>();

    let result = coordinator.request_timeout(
        "slow",
        move |_: &CacheKey| {
            gate.recv().map_err(|err| err.to_string())?;
            Ok(b"eventually".to_vec())
        },
        Duration::from_millis(20),
    );
    assert_eq!(
        result.error().map(FetchError::kind),
        Some(FetchErrorKind::Cancelled)
    );

    release.send(()).expect("release retrieval");
    let key = CacheKey::from("slow");
    for _ in 0..200 {
        if coordinator.cache().contains(&key) {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(
        coordinator.state(&key),
        ResourceState::Loaded(CacheEntry::new(b"eventually".to_vec()))
    );
}
