//! # shiptrack-carriers
//!
//! Carrier abstraction and aggregation layer: a closed set of carrier
//! adapters behind one capability trait, a registry with format-based
//! detection, and an aggregator that caches, de-duplicates and falls back.
//!
//! ## Design
//!
//! - **Adapters** normalize provider payloads into one canonical
//!   [`TrackingResult`]; without credentials (or on provider failure) they
//!   serve a deterministic synthetic result, so the platform is fully
//!   exercisable without live provider access.
//! - **Registry** maps an explicit carrier code, or a detected tracking
//!   number format, to an adapter.
//! - **Aggregator** collapses concurrent lookups per key (single-flight),
//!   serves results younger than the staleness window from cache, and
//!   prefers stale data over errors when a refresh fails.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use shiptrack_carriers::{CarrierRegistry, TrackingAggregator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = CarrierRegistry::with_default_carriers(|_| None, None);
//!     let aggregator = TrackingAggregator::new(registry);
//!     let result = aggregator.track("1234567890", Some("DHL")).await?;
//!     println!("{}: {}", result.tracking_number, result.current_status);
//!     Ok(())
//! }
//! ```

pub mod adapter;
mod aggregator;
mod error;
mod model;
pub mod providers;
mod registry;

// Re-exports
pub use adapter::{ApiCredentials, CarrierAdapter, ProviderTransport};
pub use aggregator::{BatchOutcome, TrackingAggregator, TrackingUpdate, UpdateHandler};
pub use error::{TrackingError, UpstreamError};
pub use model::{
    Address, AddressValidation, CarrierHealth, CarrierInfo, RateQuote, TrackingEvent,
    TrackingResult, TrackingStatus,
};
pub use registry::CarrierRegistry;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
