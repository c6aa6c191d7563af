//! Notification storage trait and the in-memory implementation
//!
//! The trait is the seam for a durable backend; each operation is
//! transactionally scoped to a single notification. Expired records are
//! invisible to every read path.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::NotifyError;
use crate::model::{Notification, NotificationFilter, NotificationStatus};

/// Persistence contract for notification records
#[async_trait]
pub trait NotificationStore: Send + Sync + 'static {
    async fn insert(&self, notification: Notification) -> Result<(), NotifyError>;

    /// Fetch by id; expired records are absent
    async fn get(&self, id: &str) -> Option<Notification>;

    /// A user's notifications, newest first, expired excluded
    async fn list(&self, user_id: &str, filter: &NotificationFilter) -> Vec<Notification>;

    /// Move unread -> read, stamping `read_at` exactly once.
    ///
    /// Fails with `NotFound` when the id does not exist for this user and
    /// with `InvalidTransition` when already archived; marking an
    /// already-read record again is a no-op.
    async fn mark_read(&self, id: &str, user_id: &str) -> Result<Notification, NotifyError>;

    /// Move to archived; idempotent once archived
    async fn archive(&self, id: &str, user_id: &str) -> Result<Notification, NotifyError>;

    /// Record an email delivery confirmation
    async fn set_email_sent(&self, id: &str) -> Result<(), NotifyError>;

    /// Record a push delivery confirmation
    async fn set_push_sent(&self, id: &str) -> Result<(), NotifyError>;

    /// Remove records past `expires_at`; returns how many were dropped
    async fn purge_expired(&self) -> usize;

    async fn is_available(&self) -> bool;

    /// Backend name (for logging and health reporting)
    fn name(&self) -> &'static str;
}

/// In-memory store on a concurrent map
///
/// Suitable for development, tests and single-instance deployments; a
/// durable backend implements [`NotificationStore`] instead.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(&self, notification: Notification) -> Result<(), NotifyError> {
        self.records.insert(notification.id.clone(), notification);
        Ok(())
    }

    async fn get(&self, id: &str) -> Option<Notification> {
        let now = Utc::now();
        self.records
            .get(id)
            .map(|n| n.clone())
            .filter(|n| !n.is_expired(now))
    }

    async fn list(&self, user_id: &str, filter: &NotificationFilter) -> Vec<Notification> {
        let now = Utc::now();
        let mut matches: Vec<Notification> = self
            .records
            .iter()
            .filter(|entry| {
                let n = entry.value();
                n.user_id == user_id
                    && !n.is_expired(now)
                    && filter.status.map(|s| n.status == s).unwrap_or(true)
                    && filter.kind.map(|k| n.kind == k).unwrap_or(true)
            })
            .map(|entry| entry.value().clone())
            .collect();

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches
    }

    async fn mark_read(&self, id: &str, user_id: &str) -> Result<Notification, NotifyError> {
        let now = Utc::now();
        let mut entry = self.records.get_mut(id).ok_or(NotifyError::NotFound)?;
        if entry.user_id != user_id || entry.is_expired(now) {
            return Err(NotifyError::NotFound);
        }

        match entry.status {
            NotificationStatus::Unread => {
                entry.status = NotificationStatus::Read;
                entry.read_at = Some(now);
                entry.updated_at = now;
            }
            NotificationStatus::Read => {}
            NotificationStatus::Archived => {
                return Err(NotifyError::InvalidTransition {
                    from: NotificationStatus::Archived,
                    to: NotificationStatus::Read,
                });
            }
        }
        Ok(entry.clone())
    }

    async fn archive(&self, id: &str, user_id: &str) -> Result<Notification, NotifyError> {
        let now = Utc::now();
        let mut entry = self.records.get_mut(id).ok_or(NotifyError::NotFound)?;
        if entry.user_id != user_id || entry.is_expired(now) {
            return Err(NotifyError::NotFound);
        }

        if entry.status != NotificationStatus::Archived {
            entry.status = NotificationStatus::Archived;
            entry.updated_at = now;
        }
        Ok(entry.clone())
    }

    async fn set_email_sent(&self, id: &str) -> Result<(), NotifyError> {
        let mut entry = self.records.get_mut(id).ok_or(NotifyError::NotFound)?;
        entry.email_sent = true;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn set_push_sent(&self, id: &str) -> Result<(), NotifyError> {
        let mut entry = self.records.get_mut(id).ok_or(NotifyError::NotFound)?;
        entry.push_sent = true;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.records.len();
        self.records.retain(|_, n| !n.is_expired(now));
        let purged = before - self.records.len();
        if purged > 0 {
            debug!(purged = purged, "expired notifications purged");
        }
        purged
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}
