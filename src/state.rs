use std::sync::Arc;
use std::time::Duration;

use shiptrack_carriers::{ApiCredentials, CarrierRegistry, TrackingAggregator};
use shiptrack_notify::{MemoryStore, NoopChannel, NotificationDispatcher, NotificationStore};
use shiptrack_realtime::{
    shipment_room, BroadcastGateway, EventPublisher, ServerMessage, StaticTokenVerifier,
    StreamEvent, TokenVerifier, STATUS_CHANGE, TRACKING_UPDATE,
};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: TrackingAggregator,
    pub publisher: EventPublisher,
    pub gateway: BroadcastGateway,
    pub dispatcher: NotificationDispatcher,
    pub store: Arc<dyn NotificationStore>,
    pub verifier: Option<Arc<dyn TokenVerifier>>,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        let publisher = EventPublisher::with_buffer_capacity(config.realtime.subscriber_buffer);
        let gateway = BroadcastGateway::with_buffer_capacity(config.realtime.subscriber_buffer);

        // no provider transport wired here: deployments inject their HTTP
        // client; without one every carrier answers synthetically
        let registry = CarrierRegistry::with_default_carriers(
            |code| config.carriers.api_key(code).map(ApiCredentials::new),
            None,
        );

        let publish = publisher.clone();
        let broadcast = gateway.clone();
        let aggregator = TrackingAggregator::new(registry)
            .staleness_window(Duration::from_secs(config.tracking.staleness_secs))
            .adapter_timeout(Duration::from_secs(config.tracking.adapter_timeout_secs))
            .on_update(move |update| {
                let payload =
                    serde_json::to_value(&update.result).unwrap_or(serde_json::Value::Null);
                let tracking_number = &update.result.tracking_number;

                publish.publish(
                    tracking_number,
                    StreamEvent::new(TRACKING_UPDATE, payload.clone()),
                );
                if update.status_changed {
                    publish.publish(
                        tracking_number,
                        StreamEvent::new(STATUS_CHANGE, payload.clone()),
                    );
                }
                broadcast.broadcast_to_room(
                    &shipment_room(tracking_number),
                    ServerMessage::ShipmentUpdate { data: payload },
                );
            });

        let store: Arc<dyn NotificationStore> = Arc::new(MemoryStore::new());
        let dispatcher = NotificationDispatcher::new(store.clone(), gateway.clone())
            .with_email_channel(Arc::new(NoopChannel))
            .with_push_channel(Arc::new(NoopChannel));

        let verifier: Option<Arc<dyn TokenVerifier>> = if config.auth.tokens.is_empty() {
            None
        } else {
            Some(Arc::new(StaticTokenVerifier::new(config.auth.tokens.clone())))
        };

        Self {
            aggregator,
            publisher,
            gateway,
            dispatcher,
            store,
            verifier,
        }
    }
}
