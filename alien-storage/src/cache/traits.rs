//! Traits the collection cache is generic over.

use alien_core::{PortalResult, ProjectRecord};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// A record the cache can store and patch in place.
///
/// - `record_id()` must be stable for the life of the record
/// - `apply_patch()` must leave the id untouched
pub trait CacheableRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn record_id(&self) -> &str;

    fn apply_patch(&mut self, patch: &Map<String, Value>);
}

/// Loads the full collection from the server.
#[async_trait]
pub trait CollectionFetcher<T: CacheableRecord>: Send + Sync {
    async fn fetch_collection(&self) -> PortalResult<Vec<T>>;
}

impl CacheableRecord for ProjectRecord {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &Map<String, Value>) {
        self.merge(patch);
    }
}
