//! Collection caching.

mod collection;
mod envelope;
mod traits;

pub use collection::{
    CacheConfig, CollectionCache, Refreshed, RefreshOutcome, CONNECT_FAILURE_MESSAGE,
};
pub use envelope::{CacheState, Envelope, STALENESS_WINDOW};
pub use traits::{CacheableRecord, CollectionFetcher};
