use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use shiptrack_realtime::{
    notifications_room, shipment_room, BroadcastGateway, ClientMessage, ServerMessage,
    ANALYTICS_ROOM,
};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// WebSocket upgrade; a bearer token may ride in the Authorization
/// header or the `token` query parameter
pub async fn ws_connect(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
) -> Response {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or(params.token);

    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, token: Option<String>) {
    // a presented token must verify; a missing one means anonymous
    let user_id = match token {
        Some(token) => {
            let verified = state
                .verifier
                .as_ref()
                .ok_or(shiptrack_realtime::AuthError::InvalidToken)
                .and_then(|verifier| verifier.verify(&token));
            match verified {
                Ok(user_id) => Some(user_id),
                Err(err) => {
                    tracing::warn!(error = %err, "WebSocket auth failed, closing");
                    if let Ok(json) = serde_json::to_string(&ServerMessage::error("invalid token"))
                    {
                        let _ = socket.send(Message::Text(json.into())).await;
                    }
                    let _ = socket.send(Message::Close(None)).await;
                    return;
                }
            }
        }
        None => None,
    };

    let (connection, mut outbound) = state.gateway.connect(user_id.clone());
    state
        .gateway
        .send_to_connection(&connection.id, ServerMessage::connected(user_id));

    let (mut sink, mut stream) = socket.split();

    // forward the connection's outbound queue to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let gateway = state.gateway.clone();
    let connection_id = connection.id.clone();
    let connection_user = connection.user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(message) => handle_client_message(
                            &gateway,
                            &connection_id,
                            connection_user.as_deref(),
                            message,
                        ),
                        Err(_) => {
                            gateway.send_to_connection(
                                &connection_id,
                                ServerMessage::error("unrecognized message"),
                            );
                        }
                    }
                }
                Ok(Message::Close(_)) => break,
                // binary is unsupported; protocol-level ping/pong is axum's
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.gateway.disconnect(&connection.id);
}

fn handle_client_message(
    gateway: &BroadcastGateway,
    connection_id: &str,
    user_id: Option<&str>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::JoinRoom { room } => {
            gateway.join(connection_id, &room);
            gateway.send_to_connection(connection_id, ServerMessage::JoinedRoom { room });
        }
        ClientMessage::LeaveRoom { room } => {
            gateway.leave(connection_id, &room);
            gateway.send_to_connection(connection_id, ServerMessage::LeftRoom { room });
        }
        ClientMessage::SubscribeShipment { shipment_id } => {
            let room = shipment_room(&shipment_id);
            gateway.join(connection_id, &room);
            gateway.send_to_connection(connection_id, ServerMessage::Subscribed { room });
        }
        ClientMessage::SubscribeAnalytics => {
            gateway.join(connection_id, ANALYTICS_ROOM);
            gateway.send_to_connection(
                connection_id,
                ServerMessage::Subscribed {
                    room: ANALYTICS_ROOM.to_string(),
                },
            );
        }
        ClientMessage::SubscribeNotifications => match user_id {
            Some(user_id) => {
                let room = notifications_room(user_id);
                gateway.join(connection_id, &room);
                gateway.send_to_connection(connection_id, ServerMessage::Subscribed { room });
            }
            None => {
                gateway.send_to_connection(
                    connection_id,
                    ServerMessage::error("authentication required"),
                );
            }
        },
        ClientMessage::Ping => {
            gateway.send_to_connection(connection_id, ServerMessage::pong());
        }
    }
}
