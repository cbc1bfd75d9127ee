//! Alien Portal Storage
//!
//! Client-side persistence: a key/value store over files or memory, and the
//! stale-while-revalidate cache the project list is served from.

pub mod cache;
pub mod error;
pub mod local_store;

pub use cache::{
    CacheConfig, CacheState, CacheableRecord, CollectionCache, CollectionFetcher, Envelope,
    Refreshed, RefreshOutcome, CONNECT_FAILURE_MESSAGE, STALENESS_WINDOW,
};
pub use error::{StorageError, StorageResult};
pub use local_store::{
    read_json, write_json, FileStore, KeyValueStore, MemoryStore, ACCESS_TOKEN_KEY,
    PROJECTS_CACHE_KEY, REFRESH_TOKEN_KEY, THEME_KEY,
};

/// The project list cache.
pub type ProjectCache = CollectionCache<alien_core::ProjectRecord>;
