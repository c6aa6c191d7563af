//! Error types for the carrier layer

use thiserror::Error;

/// Failure while talking to (or parsing) a provider backend
///
/// Adapters absorb these internally by falling back to a synthetic result;
/// an `UpstreamError` only escapes the aggregator when no fallback exists.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Transport-level failure (connect, TLS, non-2xx, ...)
    #[error("provider transport error: {0}")]
    Transport(String),

    /// Provider answered but the payload did not normalize
    #[error("provider payload parse error: {0}")]
    Parse(String),

    /// Provider call exceeded the configured deadline
    #[error("provider call timed out after {0}ms")]
    Timeout(u64),
}

/// Errors surfaced by the registry and aggregator
#[derive(Debug, Clone, Error)]
pub enum TrackingError {
    /// Carrier code supplied by the client is not registered
    #[error("unknown carrier: {0}")]
    UnknownCarrier(String),

    /// No registered carrier's format matched the tracking number
    #[error("could not detect carrier for tracking number: {0}")]
    UndetectableCarrier(String),

    /// Provider failure with no cached or synthetic fallback available
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl TrackingError {
    /// Client-input errors map to a 4xx at the HTTP edge
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TrackingError::UnknownCarrier(_) | TrackingError::UndetectableCarrier(_)
        )
    }
}
