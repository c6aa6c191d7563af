//! Carrier adapter capability trait
//!
//! Every carrier is one variant behind this interface; call sites never
//! branch on the concrete provider. Adapters normalize provider payloads
//! into the canonical model, and fall back to a deterministic synthetic
//! result when credentials are absent or the provider call fails; a
//! provider outage must never surface as a hard error from an adapter.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::error::UpstreamError;
use crate::model::{
    Address, AddressValidation, RateQuote, TrackingEvent, TrackingResult, TrackingStatus,
};

/// Provider API credentials, sourced from configuration
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub account_id: Option<String>,
}

impl ApiCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            account_id: None,
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

/// Transport seam for provider HTTP calls
///
/// The concrete HTTP client lives outside this crate; deployments inject an
/// implementation, tests inject canned or failing ones. Payloads come back
/// as raw JSON and each adapter owns its own normalization.
#[async_trait]
pub trait ProviderTransport: Send + Sync + 'static {
    async fn fetch_tracking(
        &self,
        carrier_code: &str,
        tracking_number: &str,
        credentials: &ApiCredentials,
    ) -> Result<serde_json::Value, UpstreamError>;

    async fn fetch_rates(
        &self,
        carrier_code: &str,
        from: &Address,
        to: &Address,
        credentials: &ApiCredentials,
    ) -> Result<serde_json::Value, UpstreamError>;

    async fn fetch_address_validation(
        &self,
        carrier_code: &str,
        address: &Address,
        credentials: &ApiCredentials,
    ) -> Result<serde_json::Value, UpstreamError>;

    /// Transport name (for logging)
    fn name(&self) -> &'static str;
}

/// One carrier behind the canonical contract
#[async_trait]
pub trait CarrierAdapter: Send + Sync + 'static {
    /// Stable uppercase code, e.g. "DHL"
    fn carrier_code(&self) -> &'static str;

    fn carrier_name(&self) -> &'static str;

    /// Broad classification, e.g. "express", "postal"
    fn carrier_type(&self) -> &'static str;

    /// True when live provider credentials and a transport are present
    fn is_configured(&self) -> bool;

    /// Operational for lookups. Synthetic mode counts, so an unconfigured
    /// adapter still participates in detection and keeps the system
    /// exercisable without provider access.
    fn is_active(&self) -> bool {
        true
    }

    /// Format-based detection predicate for this carrier's numbers
    fn matches(&self, tracking_number: &str) -> bool;

    async fn track(&self, tracking_number: &str) -> Result<TrackingResult, UpstreamError>;

    async fn get_rates(
        &self,
        from: &Address,
        to: &Address,
    ) -> Result<Vec<RateQuote>, UpstreamError>;

    async fn validate_address(
        &self,
        address: &Address,
    ) -> Result<AddressValidation, UpstreamError>;
}

/// Deterministic synthetic tracking snapshot: three ordered events ending
/// in-transit, delivery estimated two days out. Shape and status are fixed;
/// timestamps are offsets from now.
pub fn synthetic_tracking(carrier_code: &str, tracking_number: &str) -> TrackingResult {
    let now = Utc::now();
    let events = vec![
        TrackingEvent::new(TrackingStatus::LabelCreated, now - Duration::days(2))
            .with_description("Shipping label created")
            .with_location("Origin facility"),
        TrackingEvent::new(TrackingStatus::PickedUp, now - Duration::days(1))
            .with_description("Package picked up by carrier")
            .with_location("Origin facility"),
        TrackingEvent::new(TrackingStatus::InTransit, now - Duration::hours(6))
            .with_description("Package in transit to destination")
            .with_location("Sorting hub"),
    ];

    TrackingResult::new(
        tracking_number,
        carrier_code,
        TrackingStatus::InTransit,
        events,
    )
    .with_estimated_delivery(now + Duration::days(2))
}

/// Synthetic rate table with the same success shape as a live quote
pub fn synthetic_rates(carrier_code: &str) -> Vec<RateQuote> {
    vec![
        RateQuote {
            service_name: format!("{carrier_code} Ground"),
            amount: 9.99,
            currency: "USD".to_string(),
            estimated_days: 5,
        },
        RateQuote {
            service_name: format!("{carrier_code} Express"),
            amount: 24.99,
            currency: "USD".to_string(),
            estimated_days: 2,
        },
    ]
}

/// Synthetic validation: echoes the address back as normalized
pub fn synthetic_validation(address: &Address) -> AddressValidation {
    AddressValidation {
        is_valid: true,
        normalized: Some(address.clone()),
        messages: vec![],
    }
}
