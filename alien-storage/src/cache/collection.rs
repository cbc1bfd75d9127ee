//! Stale-while-revalidate cache for a whole server collection.
//!
//! The cached envelope is served immediately. A refetch only happens once the
//! envelope is older than the staleness window or on a forced refresh, and at
//! most one fetch is in flight at a time. A fetch that completes after
//! [`CollectionCache::clear`] is discarded, whether it succeeded or failed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alien_core::{Clock, NotificationCenter, SystemClock};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::envelope::{CacheState, Envelope, STALENESS_WINDOW};
use super::traits::{CacheableRecord, CollectionFetcher};
use crate::error::StorageResult;
use crate::local_store::{read_json, write_json, KeyValueStore};

/// Shown when the very first fetch fails and there is nothing to display.
pub const CONNECT_FAILURE_MESSAGE: &str = "Failed to connect to server";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Envelopes younger than this are reused without fetching.
    pub staleness_window: Duration,
    /// Whether a failed fetch over an empty cache raises a notification.
    pub notify_on_cold_failure: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness_window: STALENESS_WINDOW,
            notify_on_cold_failure: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_cold_failure_notice(mut self, enabled: bool) -> Self {
        self.notify_on_cold_failure = enabled;
        self
    }
}

/// What a call to [`CollectionCache::refresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cached envelope was fresh enough.
    Reused,
    /// A fetch completed and replaced the envelope.
    Fetched,
    /// Another fetch was already running; nothing new was started.
    Coalesced,
    /// The cache was cleared while the fetch was running; its result was dropped.
    Discarded,
    /// The fetch failed. `surfaced` is true when the user was notified.
    Failed { surfaced: bool },
}

#[derive(Debug, Clone)]
pub struct Refreshed<T> {
    pub outcome: RefreshOutcome,
    pub envelope: Envelope<T>,
}

pub struct CollectionCache<T: CacheableRecord> {
    key: String,
    store: Arc<dyn KeyValueStore>,
    fetcher: Arc<dyn CollectionFetcher<T>>,
    notifications: Arc<NotificationCenter>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    current: RwLock<Envelope<T>>,
    loaded: AtomicBool,
    in_flight: AtomicBool,
    generation: AtomicU64,
}

/// Resets the in-flight flag however the fetch ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: CacheableRecord> CollectionCache<T> {
    pub fn new(
        key: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
        fetcher: Arc<dyn CollectionFetcher<T>>,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            key: key.into(),
            store,
            fetcher,
            notifications,
            clock: Arc::new(SystemClock),
            config: CacheConfig::default(),
            current: RwLock::new(Envelope::empty()),
            loaded: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read the persisted envelope into memory.
    ///
    /// A missing or unreadable value yields the empty envelope. Storage
    /// problems are logged, never returned.
    pub async fn load(&self) -> Envelope<T> {
        let envelope = match read_json::<Envelope<T>>(self.store.as_ref(), &self.key) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => Envelope::empty(),
            Err(err) => {
                warn!(key = %self.key, error = %err, "Discarding unreadable cached collection");
                Envelope::empty()
            }
        };
        debug!(
            key = %self.key,
            records = envelope.len(),
            fetched_at = %envelope.fetched_at,
            "Loaded cached collection"
        );

        let mut current = self.current.write().await;
        *current = envelope.clone();
        self.loaded.store(true, Ordering::Release);
        envelope
    }

    /// Current in-memory envelope, loading it from storage on first use.
    pub async fn snapshot(&self) -> Envelope<T> {
        self.ensure_loaded().await;
        self.current.read().await.clone()
    }

    pub async fn records(&self) -> Vec<T> {
        self.snapshot().await.collection
    }

    /// `Loading` while a fetch runs, whether or not data is already cached.
    pub async fn state(&self) -> CacheState {
        if self.in_flight.load(Ordering::Acquire) {
            return CacheState::Loading;
        }
        if self.current.read().await.is_empty() {
            CacheState::Empty
        } else {
            CacheState::Populated
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Refetch if stale or forced; otherwise serve the cached envelope.
    pub async fn refresh(&self, force: bool) -> Refreshed<T> {
        self.ensure_loaded().await;

        if !force {
            let current = self.current.read().await;
            if current.is_fresh(self.clock.now(), self.config.staleness_window) {
                debug!(
                    key = %self.key,
                    age_secs = current.age(self.clock.now()).as_secs(),
                    "Serving fresh cached collection"
                );
                return Refreshed {
                    outcome: RefreshOutcome::Reused,
                    envelope: current.clone(),
                };
            }
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(key = %self.key, "Refresh already in flight");
            return Refreshed {
                outcome: RefreshOutcome::Coalesced,
                envelope: self.current.read().await.clone(),
            };
        }
        let _guard = InFlightGuard(&self.in_flight);
        let generation = self.generation.load(Ordering::Acquire);

        debug!(key = %self.key, force, "Fetching collection");
        match self.fetcher.fetch_collection().await {
            Ok(collection) => {
                let mut current = self.current.write().await;
                if self.generation.load(Ordering::Acquire) != generation {
                    debug!(key = %self.key, "Cache cleared during fetch, dropping result");
                    return Refreshed {
                        outcome: RefreshOutcome::Discarded,
                        envelope: current.clone(),
                    };
                }

                // Never move fetched_at backwards, even if the clock did.
                let fetched_at = self.clock.now().max(current.fetched_at);
                let envelope = Envelope::new(collection, fetched_at);
                if let Err(err) = write_json(self.store.as_ref(), &self.key, &envelope) {
                    warn!(key = %self.key, error = %err, "Failed to persist fetched collection");
                }
                *current = envelope.clone();
                debug!(key = %self.key, records = envelope.len(), "Collection refreshed");
                Refreshed {
                    outcome: RefreshOutcome::Fetched,
                    envelope,
                }
            }
            Err(err) => {
                let current = self.current.read().await;
                if self.generation.load(Ordering::Acquire) != generation {
                    debug!(key = %self.key, error = %err, "Cache cleared during failed fetch");
                    return Refreshed {
                        outcome: RefreshOutcome::Discarded,
                        envelope: current.clone(),
                    };
                }
                let envelope = current.clone();
                drop(current);

                let surfaced = envelope.is_empty() && self.config.notify_on_cold_failure;
                if surfaced {
                    self.notifications.error(CONNECT_FAILURE_MESSAGE);
                }
                warn!(
                    key = %self.key,
                    error = %err,
                    cached = envelope.len(),
                    surfaced,
                    "Collection fetch failed"
                );
                Refreshed {
                    outcome: RefreshOutcome::Failed { surfaced },
                    envelope,
                }
            }
        }
    }

    /// Shallow-merge `patch` into the record with `id` and persist.
    ///
    /// Keeps `fetched_at`. Returns false when no record has that id. The
    /// patched envelope is written before memory is swapped, so a failed
    /// write leaves both sides as they were.
    pub async fn apply_local_patch(
        &self,
        id: &str,
        patch: &Map<String, Value>,
    ) -> StorageResult<bool> {
        self.ensure_loaded().await;
        let mut current = self.current.write().await;
        let Some(index) = current.collection.iter().position(|r| r.record_id() == id) else {
            debug!(key = %self.key, id, "Local patch target not cached");
            return Ok(false);
        };

        let mut patched = current.clone();
        patched.collection[index].apply_patch(patch);
        write_json(self.store.as_ref(), &self.key, &patched)?;
        *current = patched;
        debug!(key = %self.key, id, fields = patch.len(), "Applied local patch");
        Ok(true)
    }

    /// Drop memory and persisted state. Any fetch now in flight is discarded.
    pub async fn clear(&self) -> StorageResult<()> {
        let mut current = self.current.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        *current = Envelope::empty();
        self.loaded.store(true, Ordering::Release);
        self.store.remove(&self.key)?;
        debug!(key = %self.key, "Cleared cached collection");
        Ok(())
    }

    async fn ensure_loaded(&self) {
        if !self.loaded.load(Ordering::Acquire) {
            self.load().await;
        }
    }
}

impl<T: CacheableRecord> std::fmt::Debug for CollectionCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionCache")
            .field("key", &self.key)
            .field("config", &self.config)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}
