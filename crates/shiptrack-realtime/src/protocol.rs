//! WebSocket wire protocol
//!
//! JSON messages tagged by `type`, kebab-case on the wire to match the
//! event names clients dispatch on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages a client may send to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom {
        room: String,
    },
    LeaveRoom {
        room: String,
    },
    /// Joins `shipment:{shipmentId}`
    SubscribeShipment {
        #[serde(rename = "shipmentId")]
        shipment_id: String,
    },
    /// Joins `analytics`
    SubscribeAnalytics,
    /// Joins `notifications:{userId}`; refused for anonymous connections
    SubscribeNotifications,
    /// Liveness probe, answered with `pong`
    Ping,
}

/// Messages the gateway sends to a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Handshake acknowledgement
    Connected {
        message: String,
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    JoinedRoom {
        room: String,
    },
    LeftRoom {
        room: String,
    },
    Subscribed {
        room: String,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    ShipmentUpdate {
        data: serde_json::Value,
    },
    AnalyticsUpdate {
        data: serde_json::Value,
    },
    Notification {
        data: serde_json::Value,
    },
    /// Generic topic broadcast
    Broadcast {
        event: String,
        data: serde_json::Value,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn connected(user_id: Option<String>) -> Self {
        ServerMessage::Connected {
            message: "connected".to_string(),
            user_id,
            timestamp: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        ServerMessage::Pong {
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
