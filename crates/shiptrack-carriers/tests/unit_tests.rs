//! Unit tests for shiptrack-carriers

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use shiptrack_carriers::adapter::synthetic_tracking;
use shiptrack_carriers::{
    async_trait, Address, AddressValidation, CarrierAdapter, CarrierRegistry, RateQuote,
    TrackingAggregator, TrackingError, TrackingEvent, TrackingResult, TrackingStatus,
    TrackingUpdate, UpstreamError,
};

/// Adapter with a call counter, a failure switch and a settable status
struct TestAdapter {
    calls: AtomicUsize,
    fail: AtomicBool,
    delivered: AtomicBool,
    delay: Duration,
}

impl TestAdapter {
    fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delivered: AtomicBool::new(false),
            delay,
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CarrierAdapter for TestAdapter {
    fn carrier_code(&self) -> &'static str {
        "TEST"
    }

    fn carrier_name(&self) -> &'static str {
        "Test Carrier"
    }

    fn carrier_type(&self) -> &'static str {
        "test"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn matches(&self, tracking_number: &str) -> bool {
        tracking_number.starts_with("TT")
    }

    async fn track(&self, tracking_number: &str) -> Result<TrackingResult, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Transport("connection refused".to_string()));
        }
        let status = if self.delivered.load(Ordering::SeqCst) {
            TrackingStatus::Delivered
        } else {
            TrackingStatus::InTransit
        };
        Ok(TrackingResult::new(
            tracking_number,
            "TEST",
            status,
            vec![TrackingEvent::new(status, Utc::now())],
        ))
    }

    async fn get_rates(
        &self,
        _from: &Address,
        _to: &Address,
    ) -> Result<Vec<RateQuote>, UpstreamError> {
        Ok(vec![])
    }

    async fn validate_address(
        &self,
        address: &Address,
    ) -> Result<AddressValidation, UpstreamError> {
        Ok(AddressValidation {
            is_valid: true,
            normalized: Some(address.clone()),
            messages: vec![],
        })
    }
}

fn registry_with(adapter: Arc<TestAdapter>) -> CarrierRegistry {
    CarrierRegistry::new(vec![adapter])
}

fn default_registry() -> CarrierRegistry {
    CarrierRegistry::with_default_carriers(|_| None, None)
}

// ============== Model Tests ==============

#[test]
fn test_status_wire_names() {
    assert_eq!(
        serde_json::to_value(TrackingStatus::InTransit).unwrap(),
        "IN_TRANSIT"
    );
    assert_eq!(
        serde_json::to_value(TrackingStatus::OutForDelivery).unwrap(),
        "OUT_FOR_DELIVERY"
    );
    assert_eq!(TrackingStatus::LabelCreated.to_string(), "LABEL_CREATED");
}

#[test]
fn test_events_exposed_newest_first() {
    let now = Utc::now();
    // arrival order is oldest-first here; exposure must not trust it
    let events = vec![
        TrackingEvent::new(TrackingStatus::LabelCreated, now - chrono::Duration::days(2)),
        TrackingEvent::new(TrackingStatus::InTransit, now - chrono::Duration::hours(1)),
        TrackingEvent::new(TrackingStatus::PickedUp, now - chrono::Duration::days(1)),
    ];
    let result = TrackingResult::new("TN", "TEST", TrackingStatus::InTransit, events);

    let exposed = result.events();
    assert_eq!(exposed[0].status, TrackingStatus::InTransit);
    assert_eq!(exposed[1].status, TrackingStatus::PickedUp);
    assert_eq!(exposed[2].status, TrackingStatus::LabelCreated);
}

#[test]
fn test_events_serialized_newest_first() {
    let now = Utc::now();
    let events = vec![
        TrackingEvent::new(TrackingStatus::LabelCreated, now - chrono::Duration::days(2)),
        TrackingEvent::new(TrackingStatus::InTransit, now),
    ];
    let result = TrackingResult::new("TN", "TEST", TrackingStatus::InTransit, events);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["events"][0]["status"], "IN_TRANSIT");
    assert_eq!(json["events"][1]["status"], "LABEL_CREATED");
}

#[test]
fn test_duplicate_external_event_ids_dropped() {
    let now = Utc::now();
    let events = vec![
        TrackingEvent::new(TrackingStatus::PickedUp, now).with_external_id("e1"),
        TrackingEvent::new(TrackingStatus::PickedUp, now).with_external_id("e1"),
        TrackingEvent::new(TrackingStatus::InTransit, now).with_external_id("e2"),
        // events without provider ids are never deduplicated
        TrackingEvent::new(TrackingStatus::InTransit, now),
        TrackingEvent::new(TrackingStatus::InTransit, now),
    ];
    let result = TrackingResult::new("TN", "TEST", TrackingStatus::InTransit, events);
    assert_eq!(result.event_count(), 4);
}

#[test]
fn test_is_delivered_derived_from_status() {
    let delivered = TrackingResult::new("TN", "TEST", TrackingStatus::Delivered, vec![]);
    assert!(delivered.is_delivered);

    let in_transit = TrackingResult::new("TN", "TEST", TrackingStatus::InTransit, vec![]);
    assert!(!in_transit.is_delivered);
}

#[test]
fn test_address_display_location() {
    let address = Address::new(
        Some("Berlin".to_string()),
        None,
        Some("DE".to_string()),
    );
    assert_eq!(address.display_location().unwrap(), "Berlin, DE");

    assert!(Address::default().display_location().is_none());
}

// ============== Synthetic Result Tests ==============

#[test]
fn test_synthetic_tracking_is_deterministic_in_shape() {
    let result = synthetic_tracking("DHL", "1234567890");

    assert_eq!(result.carrier_code, "DHL");
    assert_eq!(result.tracking_number, "1234567890");
    assert_eq!(result.current_status, TrackingStatus::InTransit);
    assert_eq!(result.event_count(), 3);
    assert!(!result.is_delivered);

    // estimated delivery two days out, give or take scheduling slack
    let eta = result.estimated_delivery.unwrap();
    let expected = Utc::now() + chrono::Duration::days(2);
    assert!((eta - expected).num_seconds().abs() < 60);

    // exposed newest-first: in transit, picked up, label created
    let events = result.events();
    assert_eq!(events[0].status, TrackingStatus::InTransit);
    assert_eq!(events[2].status, TrackingStatus::LabelCreated);
}

// ============== Registry Tests ==============

#[test]
fn test_registry_resolve_by_code() {
    let registry = default_registry();

    let adapter = registry.resolve(Some("dhl"), "whatever").unwrap();
    assert_eq!(adapter.carrier_code(), "DHL");

    assert!(matches!(
        registry.resolve(Some("NOPE"), "whatever"),
        Err(TrackingError::UnknownCarrier(_))
    ));
}

#[test]
fn test_registry_format_detection() {
    let registry = default_registry();

    let cases = [
        ("1234567890", "DHL"),
        ("1Z999AA10123456784", "UPS"),
        ("123456789012", "FEDEX"),
        ("123456789012345", "FEDEX"),
        ("12345678901234567890", "USPS"),
    ];
    for (number, expected) in cases {
        let adapter = registry.resolve(None, number).unwrap();
        assert_eq!(adapter.carrier_code(), expected, "number {number}");
    }

    assert!(matches!(
        registry.resolve(None, "not-a-number"),
        Err(TrackingError::UndetectableCarrier(_))
    ));
}

#[test]
fn test_registry_list_and_health() {
    let registry = default_registry();

    let listing = registry.list();
    assert_eq!(listing.len(), 4);
    assert_eq!(listing[0].carrier_code, "DHL");
    assert!(listing.iter().all(|c| c.is_active));

    let health = registry.health();
    assert_eq!(health.len(), 4);
    assert!(health.iter().all(|h| h.is_healthy));
}

// ============== Aggregator Tests ==============

#[tokio::test]
async fn test_cache_hit_skips_adapter() {
    let adapter = TestAdapter::new();
    let aggregator = TrackingAggregator::new(registry_with(adapter.clone()));

    let first = aggregator.track("TT1", Some("TEST")).await.unwrap();
    let second = aggregator.track("TT1", Some("TEST")).await.unwrap();

    assert_eq!(adapter.call_count(), 1);
    assert_eq!(first.last_updated, second.last_updated);
}

#[tokio::test]
async fn test_distinct_numbers_do_not_share_cache() {
    let adapter = TestAdapter::new();
    let aggregator = TrackingAggregator::new(registry_with(adapter.clone()));

    aggregator.track("TT1", Some("TEST")).await.unwrap();
    aggregator.track("TT2", Some("TEST")).await.unwrap();

    assert_eq!(adapter.call_count(), 2);
    assert_eq!(aggregator.cached_entry_count(), 2);
}

#[tokio::test]
async fn test_single_flight_collapses_concurrent_lookups() {
    let adapter = TestAdapter::with_delay(Duration::from_millis(100));
    let aggregator = TrackingAggregator::new(registry_with(adapter.clone()));

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let aggregator = aggregator.clone();
            tokio::spawn(async move { aggregator.track("TT1", Some("TEST")).await })
        })
        .collect();

    for task in tasks {
        let result = task.await.unwrap().unwrap();
        assert_eq!(result.tracking_number, "TT1");
    }

    assert_eq!(adapter.call_count(), 1);
}

#[tokio::test]
async fn test_failed_refresh_serves_stale_and_keeps_cache() {
    let adapter = TestAdapter::new();
    let aggregator = TrackingAggregator::new(registry_with(adapter.clone()))
        .staleness_window(Duration::ZERO);

    let fresh = aggregator.track("TT1", Some("TEST")).await.unwrap();

    adapter.fail.store(true, Ordering::SeqCst);
    let stale = aggregator.track("TT1", Some("TEST")).await.unwrap();

    assert_eq!(adapter.call_count(), 2);
    assert_eq!(stale.last_updated, fresh.last_updated);

    // the cached value survived the failed refresh
    adapter.fail.store(false, Ordering::SeqCst);
    let recovered = aggregator.track("TT1", Some("TEST")).await.unwrap();
    assert!(recovered.last_updated >= fresh.last_updated);
}

#[tokio::test]
async fn test_failure_without_cache_errors() {
    let adapter = TestAdapter::new();
    adapter.fail.store(true, Ordering::SeqCst);
    let aggregator = TrackingAggregator::new(registry_with(adapter));

    assert!(matches!(
        aggregator.track("TT1", Some("TEST")).await,
        Err(TrackingError::Upstream(_))
    ));
}

#[tokio::test]
async fn test_adapter_timeout_treated_as_failure() {
    let adapter = TestAdapter::with_delay(Duration::from_millis(200));
    let aggregator = TrackingAggregator::new(registry_with(adapter))
        .adapter_timeout(Duration::from_millis(10));

    assert!(matches!(
        aggregator.track("TT1", Some("TEST")).await,
        Err(TrackingError::Upstream(UpstreamError::Timeout(_)))
    ));
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let aggregator = TrackingAggregator::new(default_registry());

    let outcomes = aggregator
        .track_batch(
            &["1234567890".to_string(), "not-a-number".to_string()],
            None,
        )
        .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].tracking_number, "1234567890");
    assert!(outcomes[0].outcome.is_ok());
    assert!(matches!(
        outcomes[1].outcome,
        Err(TrackingError::UndetectableCarrier(_))
    ));
}

#[tokio::test]
async fn test_update_handler_sees_status_changes() {
    let adapter = TestAdapter::new();
    let updates: Arc<Mutex<Vec<TrackingUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();

    let aggregator = TrackingAggregator::new(registry_with(adapter.clone()))
        .staleness_window(Duration::ZERO)
        .on_update(move |update| {
            sink.lock().unwrap().push(update);
        });

    aggregator.track("TT1", Some("TEST")).await.unwrap();
    adapter.delivered.store(true, Ordering::SeqCst);
    aggregator.track("TT1", Some("TEST")).await.unwrap();

    let seen = updates.lock().unwrap();
    assert_eq!(seen.len(), 2);
    // first result has no predecessor to differ from
    assert!(!seen[0].status_changed);
    assert!(seen[1].status_changed);
    assert_eq!(seen[1].result.current_status, TrackingStatus::Delivered);
}

#[tokio::test]
async fn test_unconfigured_dhl_serves_deterministic_mock() {
    let aggregator = TrackingAggregator::new(default_registry());

    let result = aggregator.track("1234567890", Some("DHL")).await.unwrap();

    assert_eq!(result.carrier_code, "DHL");
    assert_eq!(result.current_status, TrackingStatus::InTransit);
    assert_eq!(result.event_count(), 3);
    let eta = result.estimated_delivery.unwrap();
    let expected = Utc::now() + chrono::Duration::days(2);
    assert!((eta - expected).num_seconds().abs() < 60);
}
