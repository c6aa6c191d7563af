//! Per-tracking-number SSE event publisher
//!
//! One channel per tracking number: created on the first subscribe,
//! discarded when the last subscriber leaves. Nothing is buffered for an
//! idle channel: this is a best-effort live feed, not a log. Fan-out
//! never blocks on a slow reader: each subscriber has a bounded outbound
//! buffer and is disconnected when it overflows.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::event::StreamEvent;

const HEARTBEAT_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

pub type SubscriberId = String;

/// One live SSE subscription
#[derive(Debug)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub tracking_number: String,
    pub connected_at: chrono::DateTime<chrono::Utc>,
    sender: mpsc::Sender<StreamEvent>,
}

impl Subscriber {
    pub fn is_active(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Registry of live SSE subscriptions, keyed by tracking number
#[derive(Clone)]
pub struct EventPublisher {
    subscribers: Arc<DashMap<SubscriberId, Arc<Subscriber>>>,
    /// tracking_number -> subscriber ids; the entry is removed when it
    /// empties, returning the channel to idle
    channels: Arc<DashMap<String, Vec<SubscriberId>>>,
    heartbeat_sender: broadcast::Sender<i64>,
    buffer_capacity: usize,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::with_buffer_capacity(DEFAULT_SUBSCRIBER_BUFFER)
    }

    /// `buffer_capacity` bounds each subscriber's outbound queue
    pub fn with_buffer_capacity(buffer_capacity: usize) -> Self {
        let (heartbeat_sender, _) = broadcast::channel(HEARTBEAT_CHANNEL_CAPACITY);
        Self {
            subscribers: Arc::new(DashMap::new()),
            channels: Arc::new(DashMap::new()),
            heartbeat_sender,
            buffer_capacity,
        }
    }

    /// Register a subscription for one tracking number
    pub fn subscribe(
        &self,
        tracking_number: impl Into<String>,
    ) -> (Arc<Subscriber>, mpsc::Receiver<StreamEvent>) {
        let tracking_number = tracking_number.into();
        let (sender, receiver) = mpsc::channel(self.buffer_capacity);

        let subscriber = Arc::new(Subscriber {
            id: uuid::Uuid::new_v4().to_string(),
            tracking_number: tracking_number.clone(),
            connected_at: chrono::Utc::now(),
            sender,
        });

        self.subscribers
            .insert(subscriber.id.clone(), subscriber.clone());
        self.channels
            .entry(tracking_number.clone())
            .or_default()
            .push(subscriber.id.clone());

        info!(
            subscriber_id = %subscriber.id,
            tracking_number = %tracking_number,
            total_subscribers = self.subscribers.len(),
            "SSE subscription registered"
        );

        (subscriber, receiver)
    }

    /// Drop a subscription; the channel entry goes with its last subscriber
    pub fn unsubscribe(&self, subscriber_id: &str) {
        if let Some((_, subscriber)) = self.subscribers.remove(subscriber_id) {
            let mut drop_channel = false;
            if let Some(mut ids) = self.channels.get_mut(&subscriber.tracking_number) {
                ids.retain(|id| id != subscriber_id);
                drop_channel = ids.is_empty();
            }
            if drop_channel {
                self.channels.remove(&subscriber.tracking_number);
            }

            info!(
                subscriber_id = %subscriber_id,
                tracking_number = %subscriber.tracking_number,
                remaining_subscribers = self.subscribers.len(),
                "SSE subscription unregistered"
            );
        }
    }

    /// Deliver an event to every subscriber of a tracking number.
    ///
    /// No subscribers is a no-op. Delivery is `try_send`: a subscriber
    /// whose buffer is full is disconnected rather than ever stalling the
    /// publisher. Returns the number of subscribers reached.
    pub fn publish(&self, tracking_number: &str, event: StreamEvent) -> usize {
        let subscriber_ids: Vec<SubscriberId> = self
            .channels
            .get(tracking_number)
            .map(|ids| ids.clone())
            .unwrap_or_default();

        if subscriber_ids.is_empty() {
            return 0;
        }

        let mut sent = 0;
        for subscriber_id in subscriber_ids {
            let Some(subscriber) = self.subscribers.get(&subscriber_id).map(|s| s.clone()) else {
                continue;
            };
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => sent += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        subscriber_id = %subscriber_id,
                        tracking_number = %tracking_number,
                        "subscriber buffer full, disconnecting slow consumer"
                    );
                    self.unsubscribe(&subscriber_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.unsubscribe(&subscriber_id);
                }
            }
        }

        debug!(
            tracking_number = %tracking_number,
            event_type = %event.event_type,
            sent_count = sent,
            "event published"
        );
        sent
    }

    /// Receiver for the shared heartbeat tick, merged into each
    /// connection's stream by the HTTP layer
    pub fn subscribe_heartbeat(&self) -> broadcast::Receiver<i64> {
        self.heartbeat_sender.subscribe()
    }

    pub fn send_heartbeat(&self) {
        let ts = chrono::Utc::now().timestamp();
        let _ = self.heartbeat_sender.send(ts);
    }

    /// Drop subscriptions whose receiver side is gone
    pub fn cleanup_dead_subscribers(&self) {
        let dead: Vec<SubscriberId> = self
            .subscribers
            .iter()
            .filter(|entry| !entry.value().is_active())
            .map(|entry| entry.key().clone())
            .collect();

        for id in dead {
            self.unsubscribe(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of tracking numbers with at least one subscriber
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_subscriber_count(&self, tracking_number: &str) -> usize {
        self.channels
            .get(tracking_number)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }
}
