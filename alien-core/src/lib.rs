//! Alien Portal Core
//!
//! Data types and pure rules shared by the storage and client crates:
//! users and roles, project records, visibility predicates, the view
//! filter pipeline, and a few small field codecs.

pub mod access;
pub mod blocker;
pub mod checklist;
pub mod clock;
pub mod error;
pub mod identity;
pub mod notify;
pub mod record;
pub mod view;

pub use access::{
    can_manage_users, can_mutate, can_reach_admin_area, can_view_internal_channel,
    ensure_admin, ensure_can_mutate, has_min_role, has_role, AccessPolicy,
};
pub use blocker::{Blocker, BLOCKER_CATEGORIES};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AccessError, PortalError, PortalResult, ValidationError};
pub use identity::{email_domain, ProjectId, Role, User};
pub use notify::{Notification, NotificationCenter, NotificationLevel};
pub use record::{ProjectRecord, INTERNAL_CHANNEL_FIELD, NAME_FIELD, PARTNERSHIP_FIELD};
pub use view::{parse_timestamp, FilterState, SortDirection, SortKind, SortSpec, ViewPipeline};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
