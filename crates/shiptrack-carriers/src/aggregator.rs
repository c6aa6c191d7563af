//! Tracking aggregator: staleness-windowed cache, single-flight
//! de-duplication and stale-fallback on refresh failure
//!
//! Concurrent lookups for the same `(carrier, number)` key collapse into
//! one adapter call; the leader broadcasts the shared outcome to every
//! waiter. Unrelated keys never contend: both the cache and the in-flight
//! registry are keyed maps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::adapter::CarrierAdapter;
use crate::error::{TrackingError, UpstreamError};
use crate::model::TrackingResult;
use crate::registry::CarrierRegistry;

const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(10);

/// A successful refresh, handed to the update handler for fan-out
#[derive(Debug, Clone)]
pub struct TrackingUpdate {
    pub result: TrackingResult,
    /// True when the status differs from the previously cached value
    pub status_changed: bool,
}

/// Callback invoked after every successful refresh; the binary wires it
/// to the event publisher
pub type UpdateHandler = Arc<dyn Fn(TrackingUpdate) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    carrier: String,
    number: String,
}

#[derive(Clone)]
struct CacheEntry {
    result: TrackingResult,
    fetched_at: Instant,
}

type FlightOutcome = Result<TrackingResult, TrackingError>;

/// Orchestrates lookups across the registry's adapters
#[derive(Clone)]
pub struct TrackingAggregator {
    registry: CarrierRegistry,
    cache: Arc<DashMap<CacheKey, CacheEntry>>,
    inflight: Arc<DashMap<CacheKey, broadcast::Sender<FlightOutcome>>>,
    staleness_window: Duration,
    adapter_timeout: Duration,
    update_handler: Option<UpdateHandler>,
}

impl TrackingAggregator {
    pub fn new(registry: CarrierRegistry) -> Self {
        Self {
            registry,
            cache: Arc::new(DashMap::new()),
            inflight: Arc::new(DashMap::new()),
            staleness_window: DEFAULT_STALENESS_WINDOW,
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
            update_handler: None,
        }
    }

    /// Maximum age of a cached result served without an upstream call
    pub fn staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    /// Hard deadline on a single adapter call; timeout counts as failure
    pub fn adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Install the refresh fan-out handler
    pub fn on_update<F>(mut self, handler: F) -> Self
    where
        F: Fn(TrackingUpdate) + Send + Sync + 'static,
    {
        self.update_handler = Some(Arc::new(handler));
        self
    }

    pub fn registry(&self) -> &CarrierRegistry {
        &self.registry
    }

    pub fn cached_entry_count(&self) -> usize {
        self.cache.len()
    }

    /// Look up one shipment, deduplicating concurrent calls per key
    pub async fn track(
        &self,
        tracking_number: &str,
        carrier_code: Option<&str>,
    ) -> Result<TrackingResult, TrackingError> {
        let adapter = self.registry.resolve(carrier_code, tracking_number)?;
        let key = CacheKey {
            carrier: adapter.carrier_code().to_string(),
            number: tracking_number.to_string(),
        };

        loop {
            if let Some(entry) = self.cache.get(&key) {
                if entry.fetched_at.elapsed() < self.staleness_window {
                    tracing::debug!(
                        carrier = %key.carrier,
                        tracking_number = %key.number,
                        "cache hit"
                    );
                    return Ok(entry.result.clone());
                }
            }

            match self.inflight.entry(key.clone()) {
                Entry::Occupied(occupied) => {
                    // a lookup for this key is already running; await its outcome
                    let mut rx = occupied.get().subscribe();
                    drop(occupied);
                    match rx.recv().await {
                        Ok(outcome) => return outcome,
                        // leader vanished without publishing; retry from the top
                        Err(_) => continue,
                    }
                }
                Entry::Vacant(vacant) => {
                    let (tx, _) = broadcast::channel(1);
                    vacant.insert(tx.clone());

                    let outcome = self.refresh(adapter.as_ref(), &key).await;
                    self.inflight.remove(&key);
                    let _ = tx.send(outcome.clone());
                    return outcome;
                }
            }
        }
    }

    /// Per-item independent lookups; one failure never aborts the rest
    pub async fn track_batch(
        &self,
        tracking_numbers: &[String],
        carrier_code: Option<&str>,
    ) -> Vec<BatchOutcome> {
        let lookups = tracking_numbers.iter().map(|number| async move {
            BatchOutcome {
                tracking_number: number.clone(),
                outcome: self.track(number, carrier_code).await,
            }
        });
        futures::future::join_all(lookups).await
    }

    async fn refresh(
        &self,
        adapter: &dyn CarrierAdapter,
        key: &CacheKey,
    ) -> Result<TrackingResult, TrackingError> {
        let previous = self.cache.get(key).map(|e| e.result.clone());

        let outcome = match tokio::time::timeout(self.adapter_timeout, adapter.track(&key.number))
            .await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(UpstreamError::Timeout(self.adapter_timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(result) => {
                let status_changed = previous
                    .as_ref()
                    .map(|p| p.current_status != result.current_status)
                    .unwrap_or(false);

                self.cache.insert(
                    key.clone(),
                    CacheEntry {
                        result: result.clone(),
                        fetched_at: Instant::now(),
                    },
                );

                if let Some(handler) = &self.update_handler {
                    handler(TrackingUpdate {
                        result: result.clone(),
                        status_changed,
                    });
                }

                Ok(result)
            }
            Err(err) => {
                // a failed refresh never evicts a good cached value
                if let Some(stale) = previous {
                    tracing::warn!(
                        carrier = %key.carrier,
                        tracking_number = %key.number,
                        error = %err,
                        "refresh failed, serving stale cached result"
                    );
                    Ok(stale)
                } else {
                    tracing::warn!(
                        carrier = %key.carrier,
                        tracking_number = %key.number,
                        error = %err,
                        "refresh failed with no cached fallback"
                    );
                    Err(TrackingError::Upstream(err))
                }
            }
        }
    }
}

/// One item of a batch lookup
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub tracking_number: String,
    pub outcome: Result<TrackingResult, TrackingError>,
}
