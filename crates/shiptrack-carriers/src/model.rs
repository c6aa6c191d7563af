//! Canonical tracking model shared by all carrier adapters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;

/// Normalized shipment status across all carriers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingStatus {
    Unknown,
    LabelCreated,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    Exception,
    Cancelled,
}

impl std::fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrackingStatus::Unknown => "UNKNOWN",
            TrackingStatus::LabelCreated => "LABEL_CREATED",
            TrackingStatus::PickedUp => "PICKED_UP",
            TrackingStatus::InTransit => "IN_TRANSIT",
            TrackingStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            TrackingStatus::Delivered => "DELIVERED",
            TrackingStatus::Exception => "EXCEPTION",
            TrackingStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// City/state/country triple; carriers vary in which parts they fill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Address {
    pub fn new(
        city: Option<String>,
        state: Option<String>,
        country: Option<String>,
    ) -> Self {
        Self { city, state, country }
    }

    /// Join the non-empty parts into a single free-form location string
    pub fn display_location(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// One scan/event in a shipment's history
///
/// `timestamp` is the sole sort key; everything else is optional because
/// carriers differ widely in granularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub status: TrackingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_event_id: Option<String>,
}

impl TrackingEvent {
    pub fn new(status: TrackingStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            status,
            description: None,
            location: None,
            timestamp,
            estimated_delivery: None,
            signed_by: None,
            external_event_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_signed_by(mut self, signed_by: impl Into<String>) -> Self {
        self.signed_by = Some(signed_by.into());
        self
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_event_id = Some(id.into());
        self
    }
}

fn serialize_newest_first<S: Serializer>(
    events: &[TrackingEvent],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut sorted: Vec<&TrackingEvent> = events.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted.serialize(serializer)
}

/// Immutable snapshot of a shipment's state as reported by one carrier
///
/// Events are stored in arrival order but always exposed newest-first;
/// upstream ordering conventions are not trusted. A fresh lookup produces a
/// new value that supersedes any cached one; there is no mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResult {
    pub tracking_number: String,
    pub carrier_code: String,
    pub current_status: TrackingStatus,
    #[serde(serialize_with = "serialize_newest_first")]
    events: Vec<TrackingEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_delivery: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub is_delivered: bool,
}

impl TrackingResult {
    /// Build a snapshot from events in arrival order.
    ///
    /// Events carrying an `external_event_id` already seen are dropped
    /// (carriers occasionally resend the same scan).
    pub fn new(
        tracking_number: impl Into<String>,
        carrier_code: impl Into<String>,
        current_status: TrackingStatus,
        mut events: Vec<TrackingEvent>,
    ) -> Self {
        let mut seen = HashSet::new();
        events.retain(|e| match &e.external_event_id {
            Some(id) => seen.insert(id.clone()),
            None => true,
        });

        Self {
            tracking_number: tracking_number.into(),
            carrier_code: carrier_code.into(),
            current_status,
            events,
            origin: None,
            destination: None,
            estimated_delivery: None,
            actual_delivery: None,
            last_updated: Utc::now(),
            is_delivered: current_status == TrackingStatus::Delivered,
        }
    }

    pub fn with_origin(mut self, origin: Address) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_destination(mut self, destination: Address) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_estimated_delivery(mut self, when: DateTime<Utc>) -> Self {
        self.estimated_delivery = Some(when);
        self
    }

    pub fn with_actual_delivery(mut self, when: DateTime<Utc>) -> Self {
        self.actual_delivery = Some(when);
        self
    }

    /// Events newest-first, regardless of arrival order
    pub fn events(&self) -> Vec<TrackingEvent> {
        let mut sorted = self.events.clone();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Registry listing entry for client-side carrier selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierInfo {
    pub carrier_code: String,
    pub carrier_name: String,
    pub carrier_type: String,
    pub is_active: bool,
}

/// Health-check snapshot for one carrier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierHealth {
    pub carrier_code: String,
    pub is_healthy: bool,
    pub last_checked: DateTime<Utc>,
}

/// One shipping rate option, normalized across carriers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    pub service_name: String,
    pub amount: f64,
    pub currency: String,
    pub estimated_days: u32,
}

/// Address validation outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}
