//! Notification store abstraction and an in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::Result;

/// Payload attached to a notification, read back on click.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationData {
    /// URL to focus or open when the notification is clicked.
    pub url: Option<String>,
}

/// A notification registered with the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Grouping tag. Showing a notification replaces any with the same tag.
    pub tag: Option<String>,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    /// Vibration pattern in milliseconds.
    pub vibrate: Vec<u32>,
    /// Display instant for trigger-backed notifications; `None` shows now.
    pub show_trigger: Option<DateTime<Utc>>,
    pub data: NotificationData,
}

impl Notification {
    /// A plain notification shown immediately.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            tag: None,
            title: title.into(),
            body: body.into(),
            icon: None,
            badge: None,
            vibrate: Vec::new(),
            show_trigger: None,
            data: NotificationData::default(),
        }
    }

    /// Whether the tag starts with `prefix`.
    pub fn has_tag_prefix(&self, prefix: &str) -> bool {
        self.tag.as_deref().is_some_and(|t| t.starts_with(prefix))
    }

    /// Whether this notification is still waiting for its trigger at `now`.
    pub fn is_pending_at(&self, now: DateTime<Utc>) -> bool {
        self.show_trigger.is_some_and(|at| at > now)
    }
}

/// Platform notification registry.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Register a notification, replacing any existing one with the same tag.
    async fn show(&self, notification: Notification) -> Result<()>;

    /// All registered, unclosed notifications whose tag starts with `prefix`.
    async fn list_by_tag_prefix(&self, prefix: &str) -> Result<Vec<Notification>>;

    /// Close the notification with `tag`. Returns whether one was found.
    async fn close(&self, tag: &str) -> Result<bool>;
}

/// In-memory notification registry.
#[derive(Debug, Default)]
pub struct MemoryNotificationStore {
    registered: RwLock<Vec<Notification>>,
}

impl MemoryNotificationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything registered.
    pub async fn all(&self) -> Vec<Notification> {
        self.registered.read().await.clone()
    }

    /// Number of registered notifications.
    pub async fn len(&self) -> usize {
        self.registered.read().await.len()
    }

    /// Whether nothing is registered.
    pub async fn is_empty(&self) -> bool {
        self.registered.read().await.is_empty()
    }

    /// Deliver every notification whose trigger is at or before `now`.
    ///
    /// Delivered notifications leave the pending set and are returned so a
    /// host can display them and later route clicks.
    pub async fn fire_due(&self, now: DateTime<Utc>) -> Vec<Notification> {
        let mut registered = self.registered.write().await;
        let (due, pending): (Vec<_>, Vec<_>) = registered
            .drain(..)
            .partition(|n| n.show_trigger.is_some_and(|at| at <= now));
        *registered = pending;

        if !due.is_empty() {
            debug!(count = due.len(), "Delivered due notifications");
        }
        due
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn show(&self, notification: Notification) -> Result<()> {
        let mut registered = self.registered.write().await;
        if let Some(ref tag) = notification.tag {
            registered.retain(|n| n.tag.as_deref() != Some(tag.as_str()));
        }
        trace!(tag = ?notification.tag, trigger = ?notification.show_trigger, "Registered notification");
        registered.push(notification);
        Ok(())
    }

    async fn list_by_tag_prefix(&self, prefix: &str) -> Result<Vec<Notification>> {
        Ok(self
            .registered
            .read()
            .await
            .iter()
            .filter(|n| n.has_tag_prefix(prefix))
            .cloned()
            .collect())
    }

    async fn close(&self, tag: &str) -> Result<bool> {
        let mut registered = self.registered.write().await;
        let before = registered.len();
        registered.retain(|n| n.tag.as_deref() != Some(tag));
        Ok(registered.len() != before)
    }
}
