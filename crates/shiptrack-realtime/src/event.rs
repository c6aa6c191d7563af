//! Event type flowing through the per-tracking-number SSE channels

use serde::{Deserialize, Serialize};

/// Name of the event emitted on every successful refresh
pub const TRACKING_UPDATE: &str = "tracking_update";

/// Name of the event emitted when a refresh changed the shipment status
pub const STATUS_CHANGE: &str = "status_change";

/// One named SSE event with a JSON payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Event name on the wire, e.g. "tracking_update"
    #[serde(rename = "event")]
    pub event_type: String,

    pub data: serde_json::Value,

    /// Business ID for client-side correlation
    pub id: String,
}

impl StreamEvent {
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            id: uuid::Uuid::new_v4().to_string(),
        }
    }
}
