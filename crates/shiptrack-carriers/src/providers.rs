//! The closed set of carrier adapter variants
//!
//! Each adapter owns its provider's status mapping, field layout and event
//! ordering convention. Canonical ordering is enforced by the model on
//! read, so upstream order is normalized but never trusted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::adapter::{
    synthetic_rates, synthetic_tracking, synthetic_validation, ApiCredentials, CarrierAdapter,
    ProviderTransport,
};
use crate::error::UpstreamError;
use crate::model::{
    Address, AddressValidation, RateQuote, TrackingEvent, TrackingResult, TrackingStatus,
};

/// Shared credential/transport pair; an adapter is live only when both exist
struct ProviderBinding {
    credentials: Option<ApiCredentials>,
    transport: Option<Arc<dyn ProviderTransport>>,
}

impl ProviderBinding {
    fn new(
        credentials: Option<ApiCredentials>,
        transport: Option<Arc<dyn ProviderTransport>>,
    ) -> Self {
        Self {
            credentials,
            transport,
        }
    }

    fn configured(&self) -> Option<(&ApiCredentials, &Arc<dyn ProviderTransport>)> {
        match (&self.credentials, &self.transport) {
            (Some(c), Some(t)) => Some((c, t)),
            _ => None,
        }
    }
}

async fn track_with_fallback(
    code: &'static str,
    tracking_number: &str,
    binding: &ProviderBinding,
    parse: impl FnOnce(Value) -> Result<TrackingResult, UpstreamError>,
) -> Result<TrackingResult, UpstreamError> {
    let Some((credentials, transport)) = binding.configured() else {
        tracing::debug!(
            carrier = code,
            tracking_number,
            "carrier not configured, serving synthetic result"
        );
        return Ok(synthetic_tracking(code, tracking_number));
    };

    match transport
        .fetch_tracking(code, tracking_number, credentials)
        .await
        .and_then(parse)
    {
        Ok(result) => Ok(result),
        Err(err) => {
            tracing::warn!(
                carrier = code,
                tracking_number,
                error = %err,
                "provider call failed, serving synthetic fallback"
            );
            Ok(synthetic_tracking(code, tracking_number))
        }
    }
}

async fn rates_with_fallback(
    code: &'static str,
    from: &Address,
    to: &Address,
    binding: &ProviderBinding,
    parse: impl FnOnce(Value) -> Result<Vec<RateQuote>, UpstreamError>,
) -> Result<Vec<RateQuote>, UpstreamError> {
    let Some((credentials, transport)) = binding.configured() else {
        return Ok(synthetic_rates(code));
    };

    match transport
        .fetch_rates(code, from, to, credentials)
        .await
        .and_then(parse)
    {
        Ok(rates) => Ok(rates),
        Err(err) => {
            tracing::warn!(carrier = code, error = %err, "rate call failed, serving synthetic rates");
            Ok(synthetic_rates(code))
        }
    }
}

async fn validation_with_fallback(
    code: &'static str,
    address: &Address,
    binding: &ProviderBinding,
    parse: impl FnOnce(Value) -> Result<AddressValidation, UpstreamError>,
) -> Result<AddressValidation, UpstreamError> {
    let Some((credentials, transport)) = binding.configured() else {
        return Ok(synthetic_validation(address));
    };

    match transport
        .fetch_address_validation(code, address, credentials)
        .await
        .and_then(parse)
    {
        Ok(validation) => Ok(validation),
        Err(err) => {
            tracing::warn!(carrier = code, error = %err, "validation call failed, serving synthetic validation");
            Ok(synthetic_validation(address))
        }
    }
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, UpstreamError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| UpstreamError::Parse(format!("bad timestamp {raw:?}: {e}")))
}

fn location_from_parts(city: Option<&str>, state: Option<&str>, country: Option<&str>) -> Option<String> {
    Address::new(
        city.map(str::to_string),
        state.map(str::to_string),
        country.map(str::to_string),
    )
    .display_location()
}

// ---------------------------------------------------------------------------
// DHL

pub struct DhlAdapter {
    binding: ProviderBinding,
}

impl DhlAdapter {
    pub fn new(
        credentials: Option<ApiCredentials>,
        transport: Option<Arc<dyn ProviderTransport>>,
    ) -> Self {
        Self {
            binding: ProviderBinding::new(credentials, transport),
        }
    }

    fn map_status(code: &str) -> TrackingStatus {
        match code {
            "pre-transit" => TrackingStatus::LabelCreated,
            "transit" => TrackingStatus::InTransit,
            "delivered" => TrackingStatus::Delivered,
            "failure" => TrackingStatus::Exception,
            _ => TrackingStatus::Unknown,
        }
    }

    // DHL reports events newest-first; arrival order is kept as-is and the
    // canonical model re-sorts on read.
    fn parse_tracking(tracking_number: &str, payload: Value) -> Result<TrackingResult, UpstreamError> {
        let shipment = payload["shipments"]
            .get(0)
            .ok_or_else(|| UpstreamError::Parse("missing shipments[0]".into()))?;

        let status = Self::map_status(shipment["status"]["statusCode"].as_str().unwrap_or(""));

        let mut events = Vec::new();
        for raw in shipment["events"].as_array().into_iter().flatten() {
            let Some(ts) = raw["timestamp"].as_str() else {
                continue;
            };
            let mut event =
                TrackingEvent::new(Self::map_status(raw["statusCode"].as_str().unwrap_or("")), parse_rfc3339(ts)?);
            if let Some(desc) = raw["description"].as_str() {
                event = event.with_description(desc);
            }
            if let Some(loc) = location_from_parts(
                raw["location"]["address"]["addressLocality"].as_str(),
                None,
                raw["location"]["address"]["countryCode"].as_str(),
            ) {
                event = event.with_location(loc);
            }
            events.push(event);
        }

        let mut result = TrackingResult::new(tracking_number, "DHL", status, events);
        if let Some(eta) = shipment["estimatedTimeOfDelivery"].as_str() {
            result = result.with_estimated_delivery(parse_rfc3339(eta)?);
        }
        Ok(result)
    }
}

#[async_trait]
impl CarrierAdapter for DhlAdapter {
    fn carrier_code(&self) -> &'static str {
        "DHL"
    }

    fn carrier_name(&self) -> &'static str {
        "DHL Express"
    }

    fn carrier_type(&self) -> &'static str {
        "express"
    }

    fn is_configured(&self) -> bool {
        self.binding.configured().is_some()
    }

    fn matches(&self, tracking_number: &str) -> bool {
        tracking_number.len() == 10 && tracking_number.chars().all(|c| c.is_ascii_digit())
    }

    async fn track(&self, tracking_number: &str) -> Result<TrackingResult, UpstreamError> {
        track_with_fallback("DHL", tracking_number, &self.binding, |payload| {
            Self::parse_tracking(tracking_number, payload)
        })
        .await
    }

    async fn get_rates(&self, from: &Address, to: &Address) -> Result<Vec<RateQuote>, UpstreamError> {
        rates_with_fallback("DHL", from, to, &self.binding, parse_generic_rates).await
    }

    async fn validate_address(&self, address: &Address) -> Result<AddressValidation, UpstreamError> {
        validation_with_fallback("DHL", address, &self.binding, parse_generic_validation).await
    }
}

// ---------------------------------------------------------------------------
// UPS

pub struct UpsAdapter {
    binding: ProviderBinding,
}

impl UpsAdapter {
    pub fn new(
        credentials: Option<ApiCredentials>,
        transport: Option<Arc<dyn ProviderTransport>>,
    ) -> Self {
        Self {
            binding: ProviderBinding::new(credentials, transport),
        }
    }

    fn map_status(code: &str) -> TrackingStatus {
        match code {
            "M" => TrackingStatus::LabelCreated,
            "P" => TrackingStatus::PickedUp,
            "I" => TrackingStatus::InTransit,
            "O" => TrackingStatus::OutForDelivery,
            "D" => TrackingStatus::Delivered,
            "X" => TrackingStatus::Exception,
            _ => TrackingStatus::Unknown,
        }
    }

    // UPS activity timestamps arrive as separate compact date/time fields
    fn parse_activity_timestamp(date: &str, time: &str) -> Result<DateTime<Utc>, UpstreamError> {
        NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M%S")
            .map(|naive| naive.and_utc())
            .map_err(|e| UpstreamError::Parse(format!("bad UPS timestamp {date:?} {time:?}: {e}")))
    }

    fn parse_tracking(tracking_number: &str, payload: Value) -> Result<TrackingResult, UpstreamError> {
        let package = payload["trackResponse"]["shipment"][0]["package"]
            .get(0)
            .ok_or_else(|| UpstreamError::Parse("missing package[0]".into()))?;

        let status = Self::map_status(package["currentStatus"]["code"].as_str().unwrap_or(""));

        let mut events = Vec::new();
        for raw in package["activity"].as_array().into_iter().flatten() {
            let (Some(date), Some(time)) = (raw["date"].as_str(), raw["time"].as_str()) else {
                continue;
            };
            let mut event = TrackingEvent::new(
                Self::map_status(raw["status"]["type"].as_str().unwrap_or("")),
                Self::parse_activity_timestamp(date, time)?,
            );
            if let Some(desc) = raw["status"]["description"].as_str() {
                event = event.with_description(desc.trim());
            }
            if let Some(loc) = location_from_parts(
                raw["location"]["address"]["city"].as_str(),
                raw["location"]["address"]["stateProvince"].as_str(),
                raw["location"]["address"]["country"].as_str(),
            ) {
                event = event.with_location(loc);
            }
            events.push(event);
        }

        // proof of delivery rides on the newest scan
        if let Some(received_by) = package["deliveryInformation"]["receivedBy"].as_str() {
            if let Some(newest) = events.iter_mut().max_by_key(|e| e.timestamp) {
                newest.signed_by = Some(received_by.to_string());
            }
        }

        let mut result = TrackingResult::new(tracking_number, "UPS", status, events);
        if let Some(date) = package["deliveryDate"][0]["date"].as_str() {
            if let Ok(ts) = Self::parse_activity_timestamp(date, "120000") {
                result = result.with_estimated_delivery(ts);
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl CarrierAdapter for UpsAdapter {
    fn carrier_code(&self) -> &'static str {
        "UPS"
    }

    fn carrier_name(&self) -> &'static str {
        "United Parcel Service"
    }

    fn carrier_type(&self) -> &'static str {
        "express"
    }

    fn is_configured(&self) -> bool {
        self.binding.configured().is_some()
    }

    fn matches(&self, tracking_number: &str) -> bool {
        tracking_number.len() == 18
            && tracking_number.starts_with("1Z")
            && tracking_number[2..].chars().all(|c| c.is_ascii_alphanumeric())
    }

    async fn track(&self, tracking_number: &str) -> Result<TrackingResult, UpstreamError> {
        track_with_fallback("UPS", tracking_number, &self.binding, |payload| {
            Self::parse_tracking(tracking_number, payload)
        })
        .await
    }

    async fn get_rates(&self, from: &Address, to: &Address) -> Result<Vec<RateQuote>, UpstreamError> {
        rates_with_fallback("UPS", from, to, &self.binding, parse_generic_rates).await
    }

    async fn validate_address(&self, address: &Address) -> Result<AddressValidation, UpstreamError> {
        validation_with_fallback("UPS", address, &self.binding, parse_generic_validation).await
    }
}

// ---------------------------------------------------------------------------
// FedEx

pub struct FedexAdapter {
    binding: ProviderBinding,
}

impl FedexAdapter {
    pub fn new(
        credentials: Option<ApiCredentials>,
        transport: Option<Arc<dyn ProviderTransport>>,
    ) -> Self {
        Self {
            binding: ProviderBinding::new(credentials, transport),
        }
    }

    fn map_status(code: &str) -> TrackingStatus {
        match code {
            "OC" => TrackingStatus::LabelCreated,
            "PU" => TrackingStatus::PickedUp,
            "IT" | "AR" | "DP" => TrackingStatus::InTransit,
            "OD" => TrackingStatus::OutForDelivery,
            "DL" => TrackingStatus::Delivered,
            "DE" | "SE" => TrackingStatus::Exception,
            "CA" => TrackingStatus::Cancelled,
            _ => TrackingStatus::Unknown,
        }
    }

    fn parse_tracking(tracking_number: &str, payload: Value) -> Result<TrackingResult, UpstreamError> {
        let track = payload["output"]["completeTrackResults"][0]["trackResults"]
            .get(0)
            .ok_or_else(|| UpstreamError::Parse("missing trackResults[0]".into()))?;

        let status =
            Self::map_status(track["latestStatusDetail"]["derivedCode"].as_str().unwrap_or(""));

        let mut events = Vec::new();
        for raw in track["scanEvents"].as_array().into_iter().flatten() {
            let Some(ts) = raw["date"].as_str() else {
                continue;
            };
            let mut event = TrackingEvent::new(
                Self::map_status(raw["derivedStatusCode"].as_str().unwrap_or("")),
                parse_rfc3339(ts)?,
            );
            if let Some(desc) = raw["eventDescription"].as_str() {
                event = event.with_description(desc);
            }
            if let Some(loc) = location_from_parts(
                raw["scanLocation"]["city"].as_str(),
                raw["scanLocation"]["stateOrProvinceCode"].as_str(),
                raw["scanLocation"]["countryCode"].as_str(),
            ) {
                event = event.with_location(loc);
            }
            // FedEx resends scans under the same eventId; the model de-dups
            if let Some(id) = raw["eventId"].as_str() {
                event = event.with_external_id(id);
            }
            events.push(event);
        }

        let mut result = TrackingResult::new(tracking_number, "FEDEX", status, events);
        for entry in track["dateAndTimes"].as_array().into_iter().flatten() {
            match entry["type"].as_str() {
                Some("ESTIMATED_DELIVERY") => {
                    if let Some(ts) = entry["dateTime"].as_str() {
                        result = result.with_estimated_delivery(parse_rfc3339(ts)?);
                    }
                }
                Some("ACTUAL_DELIVERY") => {
                    if let Some(ts) = entry["dateTime"].as_str() {
                        result = result.with_actual_delivery(parse_rfc3339(ts)?);
                    }
                }
                _ => {}
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl CarrierAdapter for FedexAdapter {
    fn carrier_code(&self) -> &'static str {
        "FEDEX"
    }

    fn carrier_name(&self) -> &'static str {
        "FedEx"
    }

    fn carrier_type(&self) -> &'static str {
        "express"
    }

    fn is_configured(&self) -> bool {
        self.binding.configured().is_some()
    }

    fn matches(&self, tracking_number: &str) -> bool {
        (tracking_number.len() == 12 || tracking_number.len() == 15)
            && tracking_number.chars().all(|c| c.is_ascii_digit())
    }

    async fn track(&self, tracking_number: &str) -> Result<TrackingResult, UpstreamError> {
        track_with_fallback("FEDEX", tracking_number, &self.binding, |payload| {
            Self::parse_tracking(tracking_number, payload)
        })
        .await
    }

    async fn get_rates(&self, from: &Address, to: &Address) -> Result<Vec<RateQuote>, UpstreamError> {
        rates_with_fallback("FEDEX", from, to, &self.binding, parse_generic_rates).await
    }

    async fn validate_address(&self, address: &Address) -> Result<AddressValidation, UpstreamError> {
        validation_with_fallback("FEDEX", address, &self.binding, parse_generic_validation).await
    }
}

// ---------------------------------------------------------------------------
// USPS

pub struct UspsAdapter {
    binding: ProviderBinding,
}

impl UspsAdapter {
    pub fn new(
        credentials: Option<ApiCredentials>,
        transport: Option<Arc<dyn ProviderTransport>>,
    ) -> Self {
        Self {
            binding: ProviderBinding::new(credentials, transport),
        }
    }

    // USPS only exposes free-text event types
    fn map_status(text: &str) -> TrackingStatus {
        let lower = text.to_ascii_lowercase();
        if lower.contains("delivered") {
            TrackingStatus::Delivered
        } else if lower.contains("out for delivery") {
            TrackingStatus::OutForDelivery
        } else if lower.contains("pre-shipment") || lower.contains("label") {
            TrackingStatus::LabelCreated
        } else if lower.contains("accept") || lower.contains("picked up") {
            TrackingStatus::PickedUp
        } else if lower.contains("alert") || lower.contains("return") {
            TrackingStatus::Exception
        } else if lower.is_empty() {
            TrackingStatus::Unknown
        } else {
            TrackingStatus::InTransit
        }
    }

    // USPS reports oldest-first, unlike the express carriers
    fn parse_tracking(tracking_number: &str, payload: Value) -> Result<TrackingResult, UpstreamError> {
        let raw_events = payload["trackingEvents"]
            .as_array()
            .ok_or_else(|| UpstreamError::Parse("missing trackingEvents".into()))?;

        let mut events = Vec::new();
        for raw in raw_events {
            let Some(ts) = raw["eventTimestamp"].as_str() else {
                continue;
            };
            let event_type = raw["eventType"].as_str().unwrap_or("");
            let mut event = TrackingEvent::new(Self::map_status(event_type), parse_rfc3339(ts)?)
                .with_description(event_type);
            if let Some(loc) = location_from_parts(
                raw["eventCity"].as_str(),
                raw["eventState"].as_str(),
                raw["eventCountry"].as_str(),
            ) {
                event = event.with_location(loc);
            }
            events.push(event);
        }

        let status = Self::map_status(payload["status"].as_str().unwrap_or(""));
        let mut result = TrackingResult::new(tracking_number, "USPS", status, events);
        if let Some(eta) = payload["expectedDeliveryDate"].as_str() {
            result = result.with_estimated_delivery(parse_rfc3339(eta)?);
        }
        Ok(result)
    }
}

#[async_trait]
impl CarrierAdapter for UspsAdapter {
    fn carrier_code(&self) -> &'static str {
        "USPS"
    }

    fn carrier_name(&self) -> &'static str {
        "United States Postal Service"
    }

    fn carrier_type(&self) -> &'static str {
        "postal"
    }

    fn is_configured(&self) -> bool {
        self.binding.configured().is_some()
    }

    fn matches(&self, tracking_number: &str) -> bool {
        (20..=22).contains(&tracking_number.len())
            && tracking_number.chars().all(|c| c.is_ascii_digit())
    }

    async fn track(&self, tracking_number: &str) -> Result<TrackingResult, UpstreamError> {
        track_with_fallback("USPS", tracking_number, &self.binding, |payload| {
            Self::parse_tracking(tracking_number, payload)
        })
        .await
    }

    async fn get_rates(&self, from: &Address, to: &Address) -> Result<Vec<RateQuote>, UpstreamError> {
        rates_with_fallback("USPS", from, to, &self.binding, parse_generic_rates).await
    }

    async fn validate_address(&self, address: &Address) -> Result<AddressValidation, UpstreamError> {
        validation_with_fallback("USPS", address, &self.binding, parse_generic_validation).await
    }
}

// ---------------------------------------------------------------------------
// Shared payload shapes for the non-core operations

fn parse_generic_rates(payload: Value) -> Result<Vec<RateQuote>, UpstreamError> {
    let raw = payload["rates"]
        .as_array()
        .ok_or_else(|| UpstreamError::Parse("missing rates".into()))?;

    let mut quotes = Vec::new();
    for entry in raw {
        quotes.push(RateQuote {
            service_name: entry["serviceName"]
                .as_str()
                .ok_or_else(|| UpstreamError::Parse("rate missing serviceName".into()))?
                .to_string(),
            amount: entry["amount"]
                .as_f64()
                .ok_or_else(|| UpstreamError::Parse("rate missing amount".into()))?,
            currency: entry["currency"].as_str().unwrap_or("USD").to_string(),
            estimated_days: entry["estimatedDays"].as_u64().unwrap_or(0) as u32,
        });
    }
    Ok(quotes)
}

fn parse_generic_validation(payload: Value) -> Result<AddressValidation, UpstreamError> {
    Ok(AddressValidation {
        is_valid: payload["isValid"].as_bool().unwrap_or(false),
        normalized: payload
            .get("normalized")
            .filter(|v| !v.is_null())
            .map(|v| {
                Address::new(
                    v["city"].as_str().map(str::to_string),
                    v["state"].as_str().map(str::to_string),
                    v["country"].as_str().map(str::to_string),
                )
            }),
        messages: payload["messages"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|m| m.as_str().map(str::to_string))
            .collect(),
    })
}
