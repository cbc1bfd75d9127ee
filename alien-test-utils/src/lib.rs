//! Alien Portal Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Proptest generators for users and project records
//! - Fixtures for users of every role and a small project catalogue
//! - Mock collection fetchers and stores for driving the cache

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub use alien_core::{
    AccessPolicy, PortalError, PortalResult, ProjectRecord, Role, User, INTERNAL_CHANNEL_FIELD,
    NAME_FIELD, PARTNERSHIP_FIELD,
};
pub use alien_storage::{
    CacheableRecord, CollectionFetcher, KeyValueStore, MemoryStore, StorageError, StorageResult,
};

use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::json;
use tokio::sync::Notify;

// ============================================================================
// GENERATORS
// ============================================================================

pub fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Superadmin),
        Just(Role::Internal),
        Just(Role::Shopline),
        Just(Role::Merchant),
        Just(Role::Unknown),
    ]
}

/// Emails spread over internal, partner and outside domains.
pub fn arb_email() -> impl Strategy<Value = String> {
    (
        "[a-z]{1,10}",
        prop_oneof![
            Just("flyrank.com".to_string()),
            Just("powercommerce.com".to_string()),
            Just("shopline.com".to_string()),
            "[a-z]{1,8}\\.example",
        ],
    )
        .prop_map(|(local, domain)| format!("{}@{}", local, domain))
}

pub fn arb_user() -> impl Strategy<Value = User> {
    (
        "[a-z0-9]{1,8}",
        arb_email(),
        arb_role(),
        proptest::collection::btree_set("[a-z0-9]{1,6}", 0..4),
    )
        .prop_map(|(id, email, role, assigned)| User::new(id, email, role).with_assigned(assigned))
}

pub fn arb_record() -> impl Strategy<Value = ProjectRecord> {
    (
        "[a-z0-9]{1,6}",
        "[A-Za-z ]{0,16}",
        proptest::option::of("C[0-9A-Z]{6}"),
        any::<bool>(),
        proptest::option::of(1_600_000_000i64..1_800_000_000),
        proptest::option::of(0u32..200),
    )
        .prop_map(|(id, name, channel, partnership, last_active, messages)| {
            let mut record = ProjectRecord::new(id)
                .with_field(NAME_FIELD, name)
                .with_field(PARTNERSHIP_FIELD, partnership);
            if let Some(channel) = channel {
                record = record.with_field(INTERNAL_CHANNEL_FIELD, channel);
            }
            let last_active = last_active
                .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
                .map(|ts| ts.to_rfc3339());
            record.with_field(
                "stats",
                json!({ "last_active": last_active, "message_count": messages }),
            )
        })
}

pub fn arb_records(max: usize) -> impl Strategy<Value = Vec<ProjectRecord>> {
    proptest::collection::vec(arb_record(), 0..max)
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn superadmin() -> User {
    User::new("u-super", "root@flyrank.com", Role::Superadmin)
}

pub fn internal_user() -> User {
    User::new("u-internal", "ops@powercommerce.com", Role::Internal)
}

pub fn shopline_user() -> User {
    User::new("u-partner", "rep@shopline.com", Role::Shopline)
}

pub fn merchant_user<I, S>(assigned: I) -> User
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    User::new("u-merchant", "owner@store.example", Role::Merchant)
        .with_assigned(assigned)
}

/// A small catalogue covering the visibility and sorting edge cases.
///
/// - `p1` internal-only (internal channel, not a partnership)
/// - `p2` partnership with an internal channel
/// - `p3` no internal channel, no activity date
/// - `p4` stuck, with a structured blocker
pub fn sample_projects() -> Vec<ProjectRecord> {
    vec![
        ProjectRecord::new("p1")
            .with_field(NAME_FIELD, "Acme Outfitters")
            .with_field("category", "Launched")
            .with_field(INTERNAL_CHANNEL_FIELD, "C0INTERNAL1")
            .with_field(PARTNERSHIP_FIELD, false)
            .with_field("owner", "Dana")
            .with_field(
                "stats",
                json!({ "last_active": "2024-03-01T10:00:00Z", "message_count": 42 }),
            ),
        ProjectRecord::new("p2")
            .with_field(NAME_FIELD, "Blue Harbor Goods")
            .with_field("category", "Almost Ready")
            .with_field(INTERNAL_CHANNEL_FIELD, "C0INTERNAL2")
            .with_field(PARTNERSHIP_FIELD, true)
            .with_field("owner", "Lee")
            .with_field(
                "stats",
                json!({ "last_active": "2024-04-15T08:30:00Z", "message_count": 7 }),
            ),
        ProjectRecord::new("p3")
            .with_field(NAME_FIELD, "copper kettle co")
            .with_field("category", "New / In Progress")
            .with_field(PARTNERSHIP_FIELD, false)
            .with_field("owner", "Lee")
            .with_field("stats", json!({ "last_active": null, "message_count": 0 })),
        ProjectRecord::new("p4")
            .with_field(NAME_FIELD, "Driftwood Supply")
            .with_field("category", "Stuck / On Hold")
            .with_field(INTERNAL_CHANNEL_FIELD, "")
            .with_field("blocker", "Merchant, 3rd Parties | Waiting on DNS")
            .with_field("owner", "Dana")
            .with_field("stats", json!({ "last_active": "2023-12-24", "message_count": 3 })),
    ]
}

/// `count` plain records with sequential ids.
pub fn numbered_projects(count: usize) -> Vec<ProjectRecord> {
    (0..count)
        .map(|i| {
            ProjectRecord::new(format!("n{}", i)).with_field(NAME_FIELD, format!("Project {}", i))
        })
        .collect()
}

// ============================================================================
// MOCK FETCHERS
// ============================================================================

/// Returns the same collection every time and counts calls.
#[derive(Debug, Default)]
pub struct StaticFetcher<T> {
    collection: Vec<T>,
    calls: AtomicUsize,
}

impl<T> StaticFetcher<T> {
    pub fn new(collection: Vec<T>) -> Self {
        Self {
            collection,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: CacheableRecord> CollectionFetcher<T> for StaticFetcher<T> {
    async fn fetch_collection(&self) -> PortalResult<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.collection.clone())
    }
}

/// Always fails, as an unreachable server would.
#[derive(Debug, Default)]
pub struct FailingFetcher {
    calls: AtomicUsize,
}

impl FailingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: CacheableRecord> CollectionFetcher<T> for FailingFetcher {
    async fn fetch_collection(&self) -> PortalResult<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PortalError::fetch("connection refused"))
    }
}

/// Blocks inside the fetch until released, so tests can act mid-flight.
///
/// Once released it returns its collection, or an error if built with
/// [`GatedFetcher::failing`].
#[derive(Debug)]
pub struct GatedFetcher<T> {
    collection: Option<Vec<T>>,
    started: Notify,
    release: Notify,
    calls: AtomicUsize,
}

impl<T> GatedFetcher<T> {
    pub fn new(collection: Vec<T>) -> Self {
        Self::gated(Some(collection))
    }

    pub fn failing() -> Self {
        Self::gated(None)
    }

    fn gated(collection: Option<Vec<T>>) -> Self {
        Self {
            collection,
            started: Notify::new(),
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Resolves once a fetch has entered the gate.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Lets one waiting fetch complete.
    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: CacheableRecord> CollectionFetcher<T> for GatedFetcher<T> {
    async fn fetch_collection(&self) -> PortalResult<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        self.collection
            .clone()
            .ok_or_else(|| PortalError::fetch("connection reset"))
    }
}

// ============================================================================
// STORES
// ============================================================================

/// Memory store that can be switched to reject every write, as a full or
/// read-only disk would.
#[derive(Debug, Default)]
pub struct LockableStore {
    inner: MemoryStore,
    locked: AtomicBool,
}

impl LockableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_writes(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }
}

impl KeyValueStore for LockableStore {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "store is read-only",
                ),
            });
        }
        self.inner.write(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(key)
    }
}
