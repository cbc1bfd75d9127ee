//! Behaviour of the stale-while-revalidate project cache.

use std::sync::Arc;

use alien_core::{ManualClock, NotificationCenter, NotificationLevel, ProjectRecord};
use alien_storage::{
    CacheConfig, CacheState, CollectionCache, CollectionFetcher, Envelope, FileStore,
    KeyValueStore, MemoryStore, RefreshOutcome, CONNECT_FAILURE_MESSAGE, PROJECTS_CACHE_KEY,
};
use alien_test_utils::{
    numbered_projects, sample_projects, FailingFetcher, GatedFetcher, LockableStore, StaticFetcher,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};

fn start_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()))
}

fn cache_over(
    store: Arc<dyn KeyValueStore>,
    fetcher: Arc<dyn CollectionFetcher<ProjectRecord>>,
    notifications: Arc<NotificationCenter>,
    clock: Arc<ManualClock>,
) -> CollectionCache<ProjectRecord> {
    CollectionCache::new(PROJECTS_CACHE_KEY, store, fetcher, notifications).with_clock(clock)
}

fn patch(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::test]
async fn second_refresh_inside_window_reuses_cache() {
    let fetcher = Arc::new(StaticFetcher::new(sample_projects()));
    let clock = start_clock();
    let cache = cache_over(
        Arc::new(MemoryStore::new()),
        fetcher.clone(),
        Arc::new(NotificationCenter::new()),
        clock.clone(),
    );

    let first = cache.refresh(false).await;
    assert_eq!(first.outcome, RefreshOutcome::Fetched);

    clock.advance(Duration::minutes(4));
    let second = cache.refresh(false).await;
    assert_eq!(second.outcome, RefreshOutcome::Reused);
    assert_eq!(second.envelope.len(), 4);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn stale_or_forced_refresh_fetches() {
    let fetcher = Arc::new(StaticFetcher::new(sample_projects()));
    let clock = start_clock();
    let cache = cache_over(
        Arc::new(MemoryStore::new()),
        fetcher.clone(),
        Arc::new(NotificationCenter::new()),
        clock.clone(),
    );

    cache.refresh(false).await;
    assert_eq!(cache.refresh(true).await.outcome, RefreshOutcome::Fetched);
    assert_eq!(fetcher.calls(), 2);

    clock.advance(Duration::minutes(5));
    assert_eq!(cache.refresh(false).await.outcome, RefreshOutcome::Fetched);
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn shorter_window_from_config_is_honoured() {
    let fetcher = Arc::new(StaticFetcher::new(sample_projects()));
    let clock = start_clock();
    let cache = cache_over(
        Arc::new(MemoryStore::new()),
        fetcher.clone(),
        Arc::new(NotificationCenter::new()),
        clock.clone(),
    )
    .with_config(CacheConfig::new().with_staleness_window(std::time::Duration::from_secs(30)));

    cache.refresh(false).await;
    clock.advance(Duration::seconds(31));
    cache.refresh(false).await;
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn local_patch_survives_reload_and_keeps_fetch_time() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let clock = start_clock();
    let cache = cache_over(
        store.clone(),
        Arc::new(StaticFetcher::new(sample_projects())),
        Arc::new(NotificationCenter::new()),
        clock.clone(),
    );
    let fetched = cache.refresh(false).await.envelope;

    let changed = cache
        .apply_local_patch("p3", &patch(&[("category", json!("Ready")), ("id", json!("hijack"))]))
        .await
        .unwrap();
    assert!(changed);

    let reopened = cache_over(
        store,
        Arc::new(FailingFetcher::new()),
        Arc::new(NotificationCenter::new()),
        clock,
    );
    let loaded = reopened.load().await;
    assert_eq!(loaded.fetched_at, fetched.fetched_at);
    assert_eq!(loaded.len(), fetched.len());

    for original in sample_projects() {
        let reloaded = loaded.collection.iter().find(|r| r.id == original.id).unwrap();
        if original.id == "p3" {
            let expected = original.clone().with_field("category", "Ready");
            assert_eq!(reloaded, &expected);
        } else {
            assert_eq!(reloaded, &original);
        }
    }
}

#[tokio::test]
async fn failed_patch_write_leaves_memory_untouched() {
    let store = Arc::new(LockableStore::new());
    let cache = cache_over(
        store.clone(),
        Arc::new(StaticFetcher::new(sample_projects())),
        Arc::new(NotificationCenter::new()),
        start_clock(),
    );
    cache.refresh(false).await;
    store.lock_writes();

    let result = cache
        .apply_local_patch("p3", &patch(&[("category", json!("Ready"))]))
        .await;
    assert!(result.is_err());

    let records = cache.records().await;
    let p3 = records.iter().find(|r| r.id == "p3").unwrap();
    assert_eq!(p3.get("category"), Some(&json!("New / In Progress")));
}

#[tokio::test]
async fn patching_an_unknown_record_is_a_no_op() {
    let cache = cache_over(
        Arc::new(MemoryStore::new()),
        Arc::new(StaticFetcher::new(sample_projects())),
        Arc::new(NotificationCenter::new()),
        start_clock(),
    );
    cache.refresh(false).await;
    let changed = cache
        .apply_local_patch("missing", &patch(&[("category", json!("Ready"))]))
        .await
        .unwrap();
    assert!(!changed);
}

#[tokio::test]
async fn cold_start_failure_notifies_once() {
    let notifications = Arc::new(NotificationCenter::new());
    let cache = cache_over(
        Arc::new(MemoryStore::new()),
        Arc::new(FailingFetcher::new()),
        notifications.clone(),
        start_clock(),
    );

    let result = cache.refresh(false).await;
    assert_eq!(result.outcome, RefreshOutcome::Failed { surfaced: true });
    assert!(result.envelope.is_empty());
    assert_eq!(cache.state().await, CacheState::Empty);

    let toasts = notifications.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, NotificationLevel::Error);
    assert_eq!(toasts[0].message, CONNECT_FAILURE_MESSAGE);
}

#[tokio::test]
async fn warm_failure_keeps_data_silently() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let clock = start_clock();
    let seeded = cache_over(
        store.clone(),
        Arc::new(StaticFetcher::new(numbered_projects(10))),
        Arc::new(NotificationCenter::new()),
        clock.clone(),
    );
    seeded.refresh(false).await;

    clock.advance(Duration::minutes(10));
    let notifications = Arc::new(NotificationCenter::new());
    let cache = cache_over(store, Arc::new(FailingFetcher::new()), notifications.clone(), clock);

    let result = cache.refresh(false).await;
    assert_eq!(result.outcome, RefreshOutcome::Failed { surfaced: false });
    assert_eq!(result.envelope.len(), 10);
    assert_eq!(cache.records().await.len(), 10);
    assert!(notifications.is_empty());
}

#[tokio::test]
async fn logout_during_refresh_discards_the_result() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(GatedFetcher::new(sample_projects()));
    let cache = Arc::new(cache_over(
        store.clone(),
        fetcher.clone(),
        Arc::new(NotificationCenter::new()),
        start_clock(),
    ));

    let task = tokio::spawn({
        let cache = cache.clone();
        async move { cache.refresh(true).await }
    });
    fetcher.wait_started().await;
    assert_eq!(cache.state().await, CacheState::Loading);

    cache.clear().await.unwrap();
    fetcher.release();
    let result = task.await.unwrap();

    assert_eq!(result.outcome, RefreshOutcome::Discarded);
    assert!(cache.load().await.is_empty());
    assert!(store.read(PROJECTS_CACHE_KEY).unwrap().is_none());
}

#[tokio::test]
async fn failed_fetch_after_logout_is_dropped_quietly() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let clock = start_clock();
    let seeded = cache_over(
        store.clone(),
        Arc::new(StaticFetcher::new(numbered_projects(10))),
        Arc::new(NotificationCenter::new()),
        clock.clone(),
    );
    seeded.refresh(false).await;
    clock.advance(Duration::minutes(10));

    let fetcher = Arc::new(GatedFetcher::<ProjectRecord>::failing());
    let notifications = Arc::new(NotificationCenter::new());
    let cache = Arc::new(cache_over(store, fetcher.clone(), notifications.clone(), clock));

    let task = tokio::spawn({
        let cache = cache.clone();
        async move { cache.refresh(false).await }
    });
    fetcher.wait_started().await;
    cache.clear().await.unwrap();
    fetcher.release();
    let result = task.await.unwrap();

    assert_eq!(result.outcome, RefreshOutcome::Discarded);
    assert!(result.envelope.is_empty());
    assert!(notifications.is_empty());
    assert_eq!(cache.state().await, CacheState::Empty);
}

#[tokio::test]
async fn warm_refresh_passes_through_loading() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let clock = start_clock();
    let seeded = cache_over(
        store.clone(),
        Arc::new(StaticFetcher::new(sample_projects())),
        Arc::new(NotificationCenter::new()),
        clock.clone(),
    );
    seeded.refresh(false).await;

    let fetcher = Arc::new(GatedFetcher::new(numbered_projects(3)));
    let cache = Arc::new(cache_over(
        store,
        fetcher.clone(),
        Arc::new(NotificationCenter::new()),
        clock,
    ));
    cache.load().await;
    assert_eq!(cache.state().await, CacheState::Populated);

    let task = tokio::spawn({
        let cache = cache.clone();
        async move { cache.refresh(true).await }
    });
    fetcher.wait_started().await;
    assert_eq!(cache.state().await, CacheState::Loading);
    // Readers keep the old data while the fetch runs.
    assert_eq!(cache.records().await.len(), 4);

    fetcher.release();
    assert_eq!(task.await.unwrap().outcome, RefreshOutcome::Fetched);
    assert_eq!(cache.state().await, CacheState::Populated);
    assert_eq!(cache.records().await.len(), 3);
}

#[tokio::test]
async fn clock_stepping_back_never_rewinds_fetched_at() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let clock = start_clock();
    let cache = cache_over(
        store,
        Arc::new(StaticFetcher::new(sample_projects())),
        Arc::new(NotificationCenter::new()),
        clock.clone(),
    );
    let first = cache.refresh(false).await.envelope.fetched_at;

    clock.advance(Duration::hours(-1));
    let second = cache.refresh(true).await;
    assert_eq!(second.outcome, RefreshOutcome::Fetched);
    assert!(second.envelope.fetched_at >= first);
    assert_eq!(cache.load().await.fetched_at, first);
}

#[tokio::test]
async fn stepped_back_clock_does_not_stretch_the_window() {
    let fetcher = Arc::new(StaticFetcher::new(sample_projects()));
    let clock = start_clock();
    let cache = cache_over(
        Arc::new(MemoryStore::new()),
        fetcher.clone(),
        Arc::new(NotificationCenter::new()),
        clock.clone(),
    );
    cache.refresh(false).await;

    clock.advance(Duration::hours(-2));
    clock.advance(Duration::minutes(90));
    assert_eq!(cache.refresh(false).await.outcome, RefreshOutcome::Fetched);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn concurrent_refresh_is_coalesced() {
    let fetcher = Arc::new(GatedFetcher::new(sample_projects()));
    let cache = Arc::new(cache_over(
        Arc::new(MemoryStore::new()),
        fetcher.clone(),
        Arc::new(NotificationCenter::new()),
        start_clock(),
    ));

    let first = tokio::spawn({
        let cache = cache.clone();
        async move { cache.refresh(true).await }
    });
    fetcher.wait_started().await;
    assert!(cache.is_refreshing());

    let second = cache.refresh(true).await;
    assert_eq!(second.outcome, RefreshOutcome::Coalesced);

    fetcher.release();
    assert_eq!(first.await.unwrap().outcome, RefreshOutcome::Fetched);
    assert_eq!(fetcher.calls(), 1);
    assert!(!cache.is_refreshing());
    assert_eq!(cache.state().await, CacheState::Populated);
}

#[tokio::test]
async fn corrupt_persisted_envelope_loads_empty() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    store.write(PROJECTS_CACHE_KEY, "{\"collection\": [").unwrap();
    let cache = cache_over(
        store,
        Arc::new(FailingFetcher::new()),
        Arc::new(NotificationCenter::new()),
        start_clock(),
    );
    let loaded: Envelope<ProjectRecord> = cache.load().await;
    assert!(loaded.is_empty());
    assert_eq!(loaded.fetched_at.timestamp(), 0);
}

#[tokio::test]
async fn file_store_persists_across_cache_instances() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
        let cache = cache_over(
            store,
            Arc::new(StaticFetcher::new(sample_projects())),
            Arc::new(NotificationCenter::new()),
            clock.clone(),
        );
        cache.refresh(false).await;
    }

    let fetcher = Arc::new(StaticFetcher::new(Vec::new()));
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let cache = cache_over(store, fetcher.clone(), Arc::new(NotificationCenter::new()), clock);

    let result = cache.refresh(false).await;
    assert_eq!(result.outcome, RefreshOutcome::Reused);
    assert_eq!(result.envelope.len(), 4);
    assert_eq!(fetcher.calls(), 0);
}
