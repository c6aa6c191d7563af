//! Notification record and its lookup filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of notification categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ShipmentUpdate,
    DeliveryAlert,
    PaymentConfirmation,
    SystemAlert,
    CarrierUpdate,
    WeatherAlert,
    DelayNotification,
    CustomsClearance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Read state; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Unread,
    Read,
    Archived,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationStatus::Unread => "unread",
            NotificationStatus::Read => "read",
            NotificationStatus::Archived => "archived",
        };
        f.write_str(s)
    }
}

/// One persisted notification
///
/// `send_email`/`send_push` record intent at creation; `email_sent`/
/// `push_sent` record the facts once a delivery channel confirms.
/// `shipment_id`/`payment_id` are lookup keys into other subsystems, not
/// ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub priority: Priority,
    pub status: NotificationStatus,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub send_email: bool,
    pub send_push: bool,
    pub email_sent: bool,
    pub push_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Past `expires_at`; equivalent to deleted for normal reads
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Creation request handed to the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub shipment_id: Option<String>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub action_text: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub send_email: bool,
    #[serde(default)]
    pub send_push: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_priority() -> Priority {
    Priority::Medium
}

impl NewNotification {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            priority: Priority::Medium,
            title: title.into(),
            message: message.into(),
            data: serde_json::Value::Null,
            shipment_id: None,
            payment_id: None,
            action_url: None,
            action_text: None,
            icon: None,
            send_email: false,
            send_push: false,
            expires_at: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn shipment(mut self, shipment_id: impl Into<String>) -> Self {
        self.shipment_id = Some(shipment_id.into());
        self
    }

    pub fn payment(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_id = Some(payment_id.into());
        self
    }

    pub fn send_email(mut self) -> Self {
        self.send_email = true;
        self
    }

    pub fn send_push(mut self) -> Self {
        self.send_push = true;
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Materialize the persisted record with a fresh id and unread status
    pub fn into_notification(self) -> Notification {
        let now = Utc::now();
        Notification {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.user_id,
            kind: self.kind,
            priority: self.priority,
            status: NotificationStatus::Unread,
            title: self.title,
            message: self.message,
            data: self.data,
            shipment_id: self.shipment_id,
            payment_id: self.payment_id,
            action_url: self.action_url,
            action_text: self.action_text,
            icon: self.icon,
            send_email: self.send_email,
            send_push: self.send_push,
            email_sent: false,
            push_sent: false,
            read_at: None,
            expires_at: self.expires_at,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Optional narrowing for list reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationFilter {
    pub status: Option<NotificationStatus>,
    pub kind: Option<NotificationKind>,
}
