//! # shiptrack-realtime
//!
//! Real-time distribution layer: a per-tracking-number SSE event publisher
//! and a room-based broadcast gateway for WebSocket clients.
//!
//! ## Features
//!
//! - **Per-number channels**: SSE subscriptions are grouped by tracking
//!   number; a channel exists only while it has subscribers
//! - **Non-blocking fan-out**: every subscriber has a bounded outbound
//!   buffer; a full buffer disconnects that subscriber instead of ever
//!   stalling the publisher
//! - **Rooms**: connections join named rooms (`general`, `user:{id}`,
//!   `shipment:{id}`, `notifications:{id}`, `analytics`, or arbitrary
//!   names) and any component holding a gateway handle can broadcast
//!   into a room
//! - **Auth seam**: token verification is consumed through a trait;
//!   issuance lives elsewhere
//! - **Reconnect policy**: an explicit client-side backoff state machine
//!   with a bounded retry budget
//!
//! ## Quick start
//!
//! ```rust
//! use shiptrack_realtime::{BroadcastGateway, ServerMessage};
//!
//! let gateway = BroadcastGateway::new();
//! let (conn, mut rx) = gateway.connect(Some("u1".to_string()));
//! gateway.join(&conn.id, "shipment:abc");
//! gateway.broadcast_to_room(
//!     "shipment:abc",
//!     ServerMessage::ShipmentUpdate { data: serde_json::json!({"status": "IN_TRANSIT"}) },
//! );
//! assert!(rx.try_recv().is_ok());
//! ```

pub mod auth;
mod backoff;
mod event;
mod gateway;
mod protocol;
mod publisher;

// Re-exports
pub use auth::{AuthError, StaticTokenVerifier, TokenVerifier};
pub use backoff::{ConnectionPhase, ReconnectPolicy, Reconnector};
pub use event::{StreamEvent, STATUS_CHANGE, TRACKING_UPDATE};
pub use gateway::{
    notifications_room, shipment_room, user_room, BroadcastGateway, ClientConnection,
    ANALYTICS_ROOM, GENERAL_ROOM,
};
pub use protocol::{ClientMessage, ServerMessage};
pub use publisher::{EventPublisher, Subscriber, SubscriberId};
