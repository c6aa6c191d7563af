//! # shiptrack-notify
//!
//! Notification record lifecycle on top of the real-time fan-out
//! primitives: a durable record of each notification with its target
//! channels and read state, and a dispatcher that persists, pushes into
//! the per-user gateway room, and hands off to delivery channels without
//! blocking the creator.
//!
//! ## Design
//!
//! - **Status is monotonic**: unread -> read -> archived, never backwards;
//!   `read_at` is stamped exactly once
//! - **Expired records are invisible**: reads filter on `expires_at`, and a
//!   periodic sweep removes them outright
//! - **Storage is a seam**: [`NotificationStore`] hides the backend;
//!   [`MemoryStore`] ships in-repo for development, tests and
//!   single-instance deployments
//! - **Delivery is fire-and-forget**: channel hand-off happens on its own
//!   task, and the `email_sent`/`push_sent` flags record confirmations
//!   after the fact

mod channel;
mod dispatcher;
mod error;
mod model;
mod store;

// Re-exports
pub use channel::{NoopChannel, NotificationChannel};
pub use dispatcher::NotificationDispatcher;
pub use error::{ChannelError, NotifyError};
pub use model::{
    NewNotification, Notification, NotificationFilter, NotificationKind, NotificationStatus,
    Priority,
};
pub use store::{MemoryStore, NotificationStore};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
