//! The cached collection plus the time it was fetched.
//!
//! An envelope is replaced as a whole. Readers never see a new collection
//! paired with an old timestamp or the other way round.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long a fetched collection is served without refetching.
pub const STALENESS_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub collection: Vec<T>,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Envelope<T> {
    /// No data, fetched at the Unix epoch.
    pub fn empty() -> Self {
        Self {
            collection: Vec::new(),
            fetched_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn new(collection: Vec<T>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            collection,
            fetched_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    /// Time since the fetch. Zero if `fetched_at` is in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Non-empty and younger than `window`.
    ///
    /// A `fetched_at` ahead of `now` means the clock stepped back, so the
    /// age is unknown and the envelope counts as stale.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        !self.is_empty() && self.fetched_at <= now && self.age(now) < window
    }
}

impl<T> Default for Envelope<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Lifecycle of a cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Loading,
    Populated,
}
