//! Client-side reconnect state machine
//!
//! Explicit phases with a bounded retry budget and capped exponential
//! delay, for downstream consumers of the SSE and WebSocket surfaces.

use std::time::Duration;

/// Retry budget and delay curve for one connection
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first retry; doubles per attempt
    pub base_delay: Duration,
    /// Ceiling on the per-attempt delay
    pub max_delay: Duration,
    /// Attempts before the machine lands in [`ConnectionPhase::Exhausted`]
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    // 1s, 2s, 4s, 8s, 16s
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
    /// Retry budget spent; terminal until the caller resets
    Exhausted,
}

/// Tracks one connection's phase and spent attempts
#[derive(Debug, Clone)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    phase: ConnectionPhase,
    attempts: u32,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            phase: ConnectionPhase::Disconnected,
            attempts: 0,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Begin the next attempt, yielding the delay to wait first.
    ///
    /// Returns `None` once the attempt budget is spent, moving the
    /// machine to `Exhausted`.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            self.phase = ConnectionPhase::Exhausted;
            return None;
        }

        let shift = self.attempts.min(31);
        let delay = self
            .policy
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.policy.max_delay);

        self.attempts += 1;
        self.phase = ConnectionPhase::Connecting;
        Some(delay)
    }

    /// A successful connection resets the retry budget
    pub fn connected(&mut self) {
        self.phase = ConnectionPhase::Connected;
        self.attempts = 0;
    }

    pub fn disconnected(&mut self) {
        if self.phase != ConnectionPhase::Exhausted {
            self.phase = ConnectionPhase::Disconnected;
        }
    }
}
