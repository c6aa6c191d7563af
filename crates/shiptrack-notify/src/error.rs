//! Error types for the notification layer

use thiserror::Error;

use crate::model::NotificationStatus;

/// Errors from notification operations
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// No such notification for this user
    #[error("notification not found")]
    NotFound,

    /// Status may only move unread -> read -> archived
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: NotificationStatus,
        to: NotificationStatus,
    },

    /// Backend failure
    #[error("store error: {0}")]
    Store(String),
}

/// Failure reported by a delivery channel collaborator
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}
