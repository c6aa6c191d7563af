//! Unit tests for shiptrack-realtime

use std::time::Duration;

use shiptrack_realtime::{
    notifications_room, shipment_room, user_room, AuthError, BroadcastGateway, ClientMessage,
    ConnectionPhase, EventPublisher, ReconnectPolicy, Reconnector, ServerMessage,
    StaticTokenVerifier, StreamEvent, TokenVerifier, GENERAL_ROOM, TRACKING_UPDATE,
};

// ============== StreamEvent Tests ==============

#[test]
fn test_stream_event_new() {
    let event = StreamEvent::new(TRACKING_UPDATE, serde_json::json!({"status": "IN_TRANSIT"}));
    assert_eq!(event.event_type, "tracking_update");
    assert!(!event.id.is_empty());
}

#[test]
fn test_stream_event_unique_ids() {
    let a = StreamEvent::new("x", serde_json::json!({}));
    let b = StreamEvent::new("x", serde_json::json!({}));
    assert_ne!(a.id, b.id);
}

// ============== EventPublisher Tests ==============

#[tokio::test]
async fn test_publisher_subscribe_and_publish() {
    let publisher = EventPublisher::new();

    let (_sub, mut rx) = publisher.subscribe("TN1");
    assert_eq!(publisher.channel_count(), 1);
    assert_eq!(publisher.channel_subscriber_count("TN1"), 1);

    let sent = publisher.publish("TN1", StreamEvent::new("tracking_update", serde_json::json!({"n": 1})));
    assert_eq!(sent, 1);

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event_type, "tracking_update");
}

#[tokio::test]
async fn test_publisher_fanout_same_order_exactly_once() {
    let publisher = EventPublisher::new();

    let (_s1, mut rx1) = publisher.subscribe("TN1");
    let (_s2, mut rx2) = publisher.subscribe("TN1");
    let (_s3, mut rx3) = publisher.subscribe("TN1");

    for n in 0..5 {
        let sent = publisher.publish("TN1", StreamEvent::new("tracking_update", serde_json::json!({"n": n})));
        assert_eq!(sent, 3);
    }

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        for n in 0..5 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.data["n"], n);
        }
        assert!(rx.try_recv().is_err());
    }
}

#[tokio::test]
async fn test_publisher_no_subscribers_is_noop() {
    let publisher = EventPublisher::new();
    let sent = publisher.publish("NOBODY", StreamEvent::new("tracking_update", serde_json::json!({})));
    assert_eq!(sent, 0);
}

#[tokio::test]
async fn test_publisher_channel_isolation() {
    let publisher = EventPublisher::new();

    let (_s1, mut rx1) = publisher.subscribe("TN1");
    let (_s2, mut rx2) = publisher.subscribe("TN2");

    publisher.publish("TN1", StreamEvent::new("tracking_update", serde_json::json!({})));

    assert!(rx1.try_recv().is_ok());
    assert!(rx2.try_recv().is_err());
}

#[tokio::test]
async fn test_publisher_unsubscribe_drops_idle_channel() {
    let publisher = EventPublisher::new();

    let (s1, _rx1) = publisher.subscribe("TN1");
    let (s2, _rx2) = publisher.subscribe("TN1");
    assert_eq!(publisher.channel_count(), 1);

    publisher.unsubscribe(&s1.id);
    assert_eq!(publisher.channel_count(), 1);

    publisher.unsubscribe(&s2.id);
    assert_eq!(publisher.channel_count(), 0);
    assert_eq!(publisher.subscriber_count(), 0);
}

#[tokio::test]
async fn test_publisher_full_buffer_disconnects_only_slow_subscriber() {
    let publisher = EventPublisher::with_buffer_capacity(2);

    // the slow subscriber never drains its receiver
    let (_slow, _slow_rx) = publisher.subscribe("TN1");
    let (_fast, mut fast_rx) = publisher.subscribe("TN1");

    // two fit in the slow buffer, the third overflows it
    for n in 0..3 {
        publisher.publish("TN1", StreamEvent::new("tracking_update", serde_json::json!({"n": n})));
        if let Ok(event) = fast_rx.try_recv() {
            assert_eq!(event.data["n"], n);
        }
    }

    assert_eq!(publisher.channel_subscriber_count("TN1"), 1);

    // the survivor still receives
    let sent = publisher.publish("TN1", StreamEvent::new("tracking_update", serde_json::json!({"n": 3})));
    assert_eq!(sent, 1);
}

#[tokio::test]
async fn test_publisher_cleanup_dead_subscribers() {
    let publisher = EventPublisher::new();

    let (_sub, rx) = publisher.subscribe("TN1");
    assert_eq!(publisher.subscriber_count(), 1);

    drop(rx);
    publisher.cleanup_dead_subscribers();

    assert_eq!(publisher.subscriber_count(), 0);
    assert_eq!(publisher.channel_count(), 0);
}

#[tokio::test]
async fn test_publisher_heartbeat() {
    let publisher = EventPublisher::new();
    let mut rx = publisher.subscribe_heartbeat();

    publisher.send_heartbeat();

    let ts = rx.recv().await.unwrap();
    assert!(ts > 0);
}

// ============== BroadcastGateway Tests ==============

#[tokio::test]
async fn test_gateway_connect_joins_general() {
    let gateway = BroadcastGateway::new();

    let (conn, _rx) = gateway.connect(None);

    assert_eq!(gateway.connection_count(), 1);
    assert_eq!(gateway.room_member_count(GENERAL_ROOM), 1);
    assert_eq!(gateway.rooms_of(&conn.id), vec![GENERAL_ROOM.to_string()]);
}

#[tokio::test]
async fn test_gateway_authenticated_connect_joins_user_room() {
    let gateway = BroadcastGateway::new();

    let (conn, _rx) = gateway.connect(Some("u1".to_string()));

    assert_eq!(conn.user_id.as_deref(), Some("u1"));
    assert_eq!(gateway.room_member_count(&user_room("u1")), 1);
}

#[tokio::test]
async fn test_gateway_join_and_leave() {
    let gateway = BroadcastGateway::new();

    let (conn, _rx) = gateway.connect(None);
    gateway.join(&conn.id, &shipment_room("S1"));
    assert_eq!(gateway.room_member_count(&shipment_room("S1")), 1);

    // joining twice is a no-op
    gateway.join(&conn.id, &shipment_room("S1"));
    assert_eq!(gateway.room_member_count(&shipment_room("S1")), 1);

    gateway.leave(&conn.id, &shipment_room("S1"));
    assert_eq!(gateway.room_member_count(&shipment_room("S1")), 0);
}

#[tokio::test]
async fn test_gateway_room_isolation() {
    let gateway = BroadcastGateway::new();

    let (subscribed, mut sub_rx) = gateway.connect(None);
    let (_bystander, mut bys_rx) = gateway.connect(None);

    gateway.join(&subscribed.id, &shipment_room("X"));

    let sent = gateway.broadcast_to_room(
        &shipment_room("X"),
        ServerMessage::ShipmentUpdate {
            data: serde_json::json!({"status": "DELIVERED"}),
        },
    );

    assert_eq!(sent, 1);
    assert!(matches!(
        sub_rx.try_recv(),
        Ok(ServerMessage::ShipmentUpdate { .. })
    ));
    assert!(bys_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_gateway_broadcast_to_empty_room() {
    let gateway = BroadcastGateway::new();
    let sent = gateway.broadcast_to_room("nobody-here", ServerMessage::pong());
    assert_eq!(sent, 0);
}

#[tokio::test]
async fn test_gateway_disconnect_removes_all_memberships() {
    let gateway = BroadcastGateway::new();

    let (conn, _rx) = gateway.connect(Some("u1".to_string()));
    gateway.join(&conn.id, &shipment_room("S1"));
    gateway.join(&conn.id, "analytics");

    gateway.disconnect(&conn.id);

    assert_eq!(gateway.connection_count(), 0);
    assert_eq!(gateway.room_member_count(GENERAL_ROOM), 0);
    assert_eq!(gateway.room_member_count(&user_room("u1")), 0);
    assert_eq!(gateway.room_member_count(&shipment_room("S1")), 0);
    assert_eq!(gateway.room_member_count("analytics"), 0);
    assert!(gateway.rooms_of(&conn.id).is_empty());
}

#[tokio::test]
async fn test_gateway_full_queue_disconnects_only_slow_member() {
    let gateway = BroadcastGateway::with_buffer_capacity(1);

    let (_slow, _slow_rx) = gateway.connect(None);
    let (_fast, mut fast_rx) = gateway.connect(None);

    // first fills the slow queue, second overflows it
    gateway.broadcast_to_room(GENERAL_ROOM, ServerMessage::pong());
    let _ = fast_rx.try_recv();
    gateway.broadcast_to_room(GENERAL_ROOM, ServerMessage::pong());

    assert_eq!(gateway.connection_count(), 1);
    assert_eq!(gateway.room_member_count(GENERAL_ROOM), 1);
}

#[tokio::test]
async fn test_gateway_cleanup_dead_connections() {
    let gateway = BroadcastGateway::new();

    let (_conn, rx) = gateway.connect(None);
    assert_eq!(gateway.connection_count(), 1);

    drop(rx);
    gateway.cleanup_dead_connections();

    assert_eq!(gateway.connection_count(), 0);
}

#[test]
fn test_room_names() {
    assert_eq!(user_room("u1"), "user:u1");
    assert_eq!(shipment_room("S1"), "shipment:S1");
    assert_eq!(notifications_room("u1"), "notifications:u1");
}

// ============== Protocol Tests ==============

#[test]
fn test_client_message_parse() {
    let msg: ClientMessage =
        serde_json::from_str(r#"{"type":"join-room","room":"analytics"}"#).unwrap();
    assert_eq!(
        msg,
        ClientMessage::JoinRoom {
            room: "analytics".to_string()
        }
    );

    let msg: ClientMessage =
        serde_json::from_str(r#"{"type":"subscribe-shipment","shipmentId":"S1"}"#).unwrap();
    assert_eq!(
        msg,
        ClientMessage::SubscribeShipment {
            shipment_id: "S1".to_string()
        }
    );

    let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    assert_eq!(msg, ClientMessage::Ping);
}

#[test]
fn test_server_message_wire_names() {
    let json = serde_json::to_value(ServerMessage::connected(Some("u1".to_string()))).unwrap();
    assert_eq!(json["type"], "connected");
    assert_eq!(json["userId"], "u1");

    let json = serde_json::to_value(ServerMessage::JoinedRoom {
        room: "general".to_string(),
    })
    .unwrap();
    assert_eq!(json["type"], "joined-room");

    let json = serde_json::to_value(ServerMessage::ShipmentUpdate {
        data: serde_json::json!({}),
    })
    .unwrap();
    assert_eq!(json["type"], "shipment-update");

    let json = serde_json::to_value(ServerMessage::error("bad token")).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["message"], "bad token");
}

#[test]
fn test_connected_omits_missing_user() {
    let json = serde_json::to_value(ServerMessage::connected(None)).unwrap();
    assert!(json.get("userId").is_none());
}

// ============== Auth Tests ==============

#[test]
fn test_static_verifier_accepts_known_token() {
    let verifier = StaticTokenVerifier::default().with_token("secret", "u1");
    assert_eq!(verifier.verify("secret").unwrap(), "u1");
}

#[test]
fn test_static_verifier_rejects_unknown_token() {
    let verifier = StaticTokenVerifier::default().with_token("secret", "u1");
    assert!(matches!(
        verifier.verify("wrong"),
        Err(AuthError::InvalidToken)
    ));
}

// ============== Reconnector Tests ==============

#[test]
fn test_reconnector_backoff_sequence() {
    let mut reconnector = Reconnector::new(ReconnectPolicy::default());
    assert_eq!(reconnector.phase(), ConnectionPhase::Disconnected);

    let delays: Vec<Option<Duration>> = (0..6).map(|_| reconnector.next_delay()).collect();
    assert_eq!(
        delays,
        vec![
            Some(Duration::from_secs(1)),
            Some(Duration::from_secs(2)),
            Some(Duration::from_secs(4)),
            Some(Duration::from_secs(8)),
            Some(Duration::from_secs(16)),
            None,
        ]
    );
    assert_eq!(reconnector.phase(), ConnectionPhase::Exhausted);
}

#[test]
fn test_reconnector_delay_capped() {
    let policy = ReconnectPolicy {
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(4),
        max_attempts: 10,
    };
    let mut reconnector = Reconnector::new(policy);

    let mut last = Duration::ZERO;
    for _ in 0..10 {
        last = reconnector.next_delay().unwrap();
    }
    assert_eq!(last, Duration::from_secs(4));
}

#[test]
fn test_reconnector_connected_resets_budget() {
    let mut reconnector = Reconnector::new(ReconnectPolicy::default());

    reconnector.next_delay();
    reconnector.next_delay();
    assert_eq!(reconnector.attempts(), 2);

    reconnector.connected();
    assert_eq!(reconnector.phase(), ConnectionPhase::Connected);
    assert_eq!(reconnector.attempts(), 0);

    reconnector.disconnected();
    assert_eq!(reconnector.next_delay(), Some(Duration::from_secs(1)));
}
