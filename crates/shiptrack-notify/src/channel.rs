//! Delivery channel seam
//!
//! Email rendering and push transport are external collaborators; this
//! crate only defines the hand-off contract and records confirmations.

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::model::Notification;

/// One out-of-band delivery channel (email, push, ...)
#[async_trait]
pub trait NotificationChannel: Send + Sync + 'static {
    async fn deliver(&self, notification: &Notification) -> Result<(), ChannelError>;

    /// Channel name (for logging)
    fn name(&self) -> &'static str;
}

/// Accepts every delivery without doing anything
///
/// Keeps the dispatch wiring exercisable when no transport is configured.
#[derive(Clone, Default)]
pub struct NoopChannel;

#[async_trait]
impl NotificationChannel for NoopChannel {
    async fn deliver(&self, _notification: &Notification) -> Result<(), ChannelError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Noop"
    }
}
