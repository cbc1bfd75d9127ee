//! Toast notifications.
//!
//! A small queue the UI polls. Entries expire after their lifetime; the
//! UI may also dismiss them early.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// How long a toast stays up unless dismissed, in seconds.
pub const DEFAULT_TOAST_LIFETIME_SECS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            level,
            message: message.into(),
            created_at: now,
            expires_at: now + Duration::seconds(DEFAULT_TOAST_LIFETIME_SECS),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.expires_at = self.created_at + lifetime;
        self
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Shared, thread-safe notification queue.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    queue: Mutex<Vec<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, notification: Notification) -> Uuid {
        let id = notification.id;
        self.lock().push(notification);
        id
    }

    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) -> Uuid {
        self.push(Notification::new(level, message, Utc::now()))
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.notify(NotificationLevel::Error, message)
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.notify(NotificationLevel::Success, message)
    }

    /// Unexpired notifications, oldest first. Expired ones are pruned.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<Notification> {
        let mut queue = self.lock();
        queue.retain(|n| n.is_active(now));
        queue.clone()
    }

    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut queue = self.lock();
        let before = queue.len();
        queue.retain(|n| n.id != id);
        queue.len() != before
    }

    /// Take everything queued, expired or not.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
