//! Carrier registry: code lookup, format detection and health listing

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::adapter::{ApiCredentials, CarrierAdapter, ProviderTransport};
use crate::error::TrackingError;
use crate::model::{CarrierHealth, CarrierInfo};
use crate::providers::{DhlAdapter, FedexAdapter, UpsAdapter, UspsAdapter};

/// Registry of configured carrier adapters
///
/// Populated once at process start; lookups never mutate it. Health state
/// is re-evaluated out of band and kept in a side map keyed by carrier code.
#[derive(Clone)]
pub struct CarrierRegistry {
    /// Registration order is the detection order
    adapters: Arc<Vec<Arc<dyn CarrierAdapter>>>,
    /// carrier_code -> last health evaluation
    health: Arc<DashMap<String, CarrierHealth>>,
}

impl CarrierRegistry {
    pub fn new(adapters: Vec<Arc<dyn CarrierAdapter>>) -> Self {
        let registry = Self {
            adapters: Arc::new(adapters),
            health: Arc::new(DashMap::new()),
        };
        registry.refresh_health();
        registry
    }

    /// Build the standard carrier set. Carriers without credentials run in
    /// synthetic mode and still participate in detection.
    pub fn with_default_carriers(
        credentials: impl Fn(&str) -> Option<ApiCredentials>,
        transport: Option<Arc<dyn ProviderTransport>>,
    ) -> Self {
        Self::new(vec![
            Arc::new(DhlAdapter::new(credentials("DHL"), transport.clone())),
            Arc::new(UpsAdapter::new(credentials("UPS"), transport.clone())),
            Arc::new(FedexAdapter::new(credentials("FEDEX"), transport.clone())),
            Arc::new(UspsAdapter::new(credentials("USPS"), transport)),
        ])
    }

    /// Direct lookup by carrier code (case-insensitive)
    pub fn get(&self, carrier_code: &str) -> Option<Arc<dyn CarrierAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.carrier_code().eq_ignore_ascii_case(carrier_code))
            .cloned()
    }

    /// Resolve an adapter from an explicit code or by format detection
    pub fn resolve(
        &self,
        carrier_code: Option<&str>,
        tracking_number: &str,
    ) -> Result<Arc<dyn CarrierAdapter>, TrackingError> {
        match carrier_code {
            Some(code) => self
                .get(code)
                .ok_or_else(|| TrackingError::UnknownCarrier(code.to_string())),
            None => self
                .adapters
                .iter()
                .find(|a| a.is_active() && a.matches(tracking_number))
                .cloned()
                .ok_or_else(|| TrackingError::UndetectableCarrier(tracking_number.to_string())),
        }
    }

    /// Ordered listing for client-side carrier selection
    pub fn list(&self) -> Vec<CarrierInfo> {
        self.adapters
            .iter()
            .map(|a| CarrierInfo {
                carrier_code: a.carrier_code().to_string(),
                carrier_name: a.carrier_name().to_string(),
                carrier_type: a.carrier_type().to_string(),
                is_active: a.is_active(),
            })
            .collect()
    }

    /// Re-evaluate every adapter and stamp the check time
    pub fn refresh_health(&self) {
        let now: DateTime<Utc> = Utc::now();
        for adapter in self.adapters.iter() {
            self.health.insert(
                adapter.carrier_code().to_string(),
                CarrierHealth {
                    carrier_code: adapter.carrier_code().to_string(),
                    is_healthy: adapter.is_active(),
                    last_checked: now,
                },
            );
        }
    }

    /// Latest health snapshot, in registration order
    pub fn health(&self) -> Vec<CarrierHealth> {
        self.adapters
            .iter()
            .filter_map(|a| self.health.get(a.carrier_code()).map(|h| h.clone()))
            .collect()
    }

    pub fn carrier_count(&self) -> usize {
        self.adapters.len()
    }
}
