use std::sync::{mpsc, Arc};

use fetch_coordinator::{
    CacheEntry, CacheKey, CoordinatorConfig, DeferredExecutor, FetchCoordinator, FetchResult,
    ResourceState,
};
use futures::executor::block_on;
use pretty_assertions::assert_eq;

#[test]
fn subscription_resolves_when_awaited() {
    let coordinator = FetchCoordinator::new(CoordinatorConfig::default()).expect("coordinator");

    let result = block_on(coordinator.subscribe("font/inter.woff2", |_: &CacheKey| {
        Ok(vec![0x77, 0x4f, 0x46, 0x32])
    }));

    assert_eq!(
        result.entry().map(|e| e.bytes().to_vec()),
        Some(vec![0x77, 0x4f, 0x46, 0x32])
    );
}

#[test]
fn joined_subscriptions_resolve_together_when_awaited() {
    let coordinator = FetchCoordinator::new(CoordinatorConfig::default()).expect("coordinator");
    let (release, gate) = mpsc::channel::<()>();

    let first = coordinator.subscribe("sprite", move |_: &CacheKey| {
        gate.recv().map_err(|err| err.to_string())?;
        Ok(vec![4, 2])
    });
    let second = coordinator.subscribe("sprite", |_: &CacheKey| Ok(vec![0]));

    release.send(()).expect("release retrieval");
    let (first, second) = block_on(futures::future::join(first, second));
    assert_eq!(first, second);
    assert_eq!(first.entry().map(|e| e.bytes().to_vec()), Some(vec![4, 2]));
}

#[test]
fn cache_hit_is_ready_on_first_poll() {
    let executor = DeferredExecutor::default();
    let coordinator = FetchCoordinator::builder()
        .executor(Arc::new(executor.clone()))
        .build()
        .expect("coordinator");
    let pending = coordinator.subscribe("k", |_: &CacheKey| Ok(vec![3]));
    executor.run_pending();
    assert!(block_on(pending).is_success());

    let hit = coordinator.subscribe("k", |_: &CacheKey| Ok(vec![0]));
    assert_eq!(hit.state(), ResourceState::Loaded(CacheEntry::new(vec![3])));
    assert_eq!(
        futures::FutureExt::now_or_never(hit),
        Some(FetchResult::Success(CacheEntry::new(vec![3])))
    );
}
