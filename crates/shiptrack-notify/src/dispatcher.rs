//! Notification dispatcher
//!
//! Persists each new notification, pushes it into the owner's gateway
//! room, and hands off to delivery channels on their own tasks; the
//! creator never waits on a transport. Channel confirmations land in the
//! `email_sent`/`push_sent` flags after the fact.

use std::sync::Arc;
use tracing::{info, warn};

use shiptrack_realtime::{notifications_room, BroadcastGateway, ServerMessage};

use crate::channel::NotificationChannel;
use crate::error::NotifyError;
use crate::model::{NewNotification, Notification, NotificationFilter};
use crate::store::NotificationStore;

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    gateway: BroadcastGateway,
    email_channel: Option<Arc<dyn NotificationChannel>>,
    push_channel: Option<Arc<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, gateway: BroadcastGateway) -> Self {
        Self {
            store,
            gateway,
            email_channel: None,
            push_channel: None,
        }
    }

    pub fn with_email_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.email_channel = Some(channel);
        self
    }

    pub fn with_push_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.push_channel = Some(channel);
        self
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    /// Persist a notification, broadcast it to the owner's room, and kick
    /// off channel delivery. Returns once the record is stored; delivery
    /// runs on its own tasks.
    pub async fn create(&self, new: NewNotification) -> Result<Notification, NotifyError> {
        let notification = new.into_notification();
        self.store.insert(notification.clone()).await?;

        let payload =
            serde_json::to_value(&notification).unwrap_or(serde_json::Value::Null);
        let reached = self.gateway.broadcast_to_room(
            &notifications_room(&notification.user_id),
            ServerMessage::Notification { data: payload },
        );

        info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = ?notification.kind,
            reached = reached,
            "notification created"
        );

        if notification.send_email {
            if let Some(channel) = &self.email_channel {
                self.spawn_delivery(channel.clone(), notification.clone(), DeliveryKind::Email);
            }
        }
        if notification.send_push {
            if let Some(channel) = &self.push_channel {
                self.spawn_delivery(channel.clone(), notification.clone(), DeliveryKind::Push);
            }
        }

        Ok(notification)
    }

    pub async fn mark_read(&self, id: &str, user_id: &str) -> Result<Notification, NotifyError> {
        self.store.mark_read(id, user_id).await
    }

    pub async fn archive(&self, id: &str, user_id: &str) -> Result<Notification, NotifyError> {
        self.store.archive(id, user_id).await
    }

    pub async fn list(&self, user_id: &str, filter: &NotificationFilter) -> Vec<Notification> {
        self.store.list(user_id, filter).await
    }

    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }

    fn spawn_delivery(
        &self,
        channel: Arc<dyn NotificationChannel>,
        notification: Notification,
        kind: DeliveryKind,
    ) {
        let store = self.store.clone();
        tokio::spawn(async move {
            let channel_name = channel.name();
            match channel.deliver(&notification).await {
                Ok(()) => {
                    let confirmed = match kind {
                        DeliveryKind::Email => store.set_email_sent(&notification.id).await,
                        DeliveryKind::Push => store.set_push_sent(&notification.id).await,
                    };
                    // the record may have expired mid-delivery
                    if let Err(err) = confirmed {
                        warn!(
                            notification_id = %notification.id,
                            channel = channel_name,
                            error = %err,
                            "delivery confirmed but not recorded"
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        notification_id = %notification.id,
                        channel = channel_name,
                        error = %err,
                        "channel delivery failed"
                    );
                }
            }
        });
    }
}

#[derive(Clone, Copy)]
enum DeliveryKind {
    Email,
    Push,
}
