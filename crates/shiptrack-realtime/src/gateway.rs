//! Room-based broadcast gateway
//!
//! Every WebSocket connection registers here with a bounded outbound
//! queue and a set of joined rooms. Other components hold a cloned
//! gateway handle and push into rooms by name; there is no ambient
//! global broadcaster. An empty room is not an error, and a member whose
//! queue overflows is disconnected without affecting the rest of the room.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::ServerMessage;

const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Room every connection joins on connect
pub const GENERAL_ROOM: &str = "general";

/// Room for platform-wide analytics feeds
pub const ANALYTICS_ROOM: &str = "analytics";

pub fn user_room(user_id: &str) -> String {
    format!("user:{user_id}")
}

pub fn shipment_room(shipment_id: &str) -> String {
    format!("shipment:{shipment_id}")
}

pub fn notifications_room(user_id: &str) -> String {
    format!("notifications:{user_id}")
}

pub type ConnectionId = String;

/// One registered WebSocket connection
#[derive(Debug)]
pub struct ClientConnection {
    pub id: ConnectionId,
    /// Present when the connection authenticated at the handshake
    pub user_id: Option<String>,
    pub connected_at: chrono::DateTime<chrono::Utc>,
    sender: mpsc::Sender<ServerMessage>,
}

impl ClientConnection {
    pub fn is_active(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Connection and room registry with fire-and-forget room broadcast
#[derive(Clone)]
pub struct BroadcastGateway {
    connections: Arc<DashMap<ConnectionId, Arc<ClientConnection>>>,
    /// room -> member connection ids; empty rooms are removed
    rooms: Arc<DashMap<String, Vec<ConnectionId>>>,
    /// connection id -> joined rooms, for teardown on disconnect
    memberships: Arc<DashMap<ConnectionId, Vec<String>>>,
    buffer_capacity: usize,
}

impl Default for BroadcastGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastGateway {
    pub fn new() -> Self {
        Self::with_buffer_capacity(DEFAULT_OUTBOUND_BUFFER)
    }

    /// `buffer_capacity` bounds each member's outbound queue
    pub fn with_buffer_capacity(buffer_capacity: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            rooms: Arc::new(DashMap::new()),
            memberships: Arc::new(DashMap::new()),
            buffer_capacity,
        }
    }

    /// Register a connection; it joins `general`, plus `user:{id}` when
    /// authenticated
    pub fn connect(
        &self,
        user_id: Option<String>,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<ServerMessage>) {
        let (sender, receiver) = mpsc::channel(self.buffer_capacity);

        let connection = Arc::new(ClientConnection {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            connected_at: chrono::Utc::now(),
            sender,
        });

        self.connections
            .insert(connection.id.clone(), connection.clone());
        self.memberships.insert(connection.id.clone(), Vec::new());

        self.join(&connection.id, GENERAL_ROOM);
        if let Some(ref user_id) = user_id {
            self.join(&connection.id, &user_room(user_id));
        }

        info!(
            connection_id = %connection.id,
            user_id = ?user_id,
            total_connections = self.connections.len(),
            "gateway connection registered"
        );

        (connection, receiver)
    }

    /// Add a connection to a room; joining twice is a no-op
    pub fn join(&self, connection_id: &str, room: &str) {
        if !self.connections.contains_key(connection_id) {
            warn!(connection_id = %connection_id, room = %room, "join from unknown connection");
            return;
        }

        let mut members = self.rooms.entry(room.to_string()).or_default();
        if !members.iter().any(|id| id == connection_id) {
            members.push(connection_id.to_string());
        }
        drop(members);

        if let Some(mut joined) = self.memberships.get_mut(connection_id) {
            if !joined.iter().any(|r| r == room) {
                joined.push(room.to_string());
            }
        }

        debug!(connection_id = %connection_id, room = %room, "joined room");
    }

    pub fn leave(&self, connection_id: &str, room: &str) {
        let mut drop_room = false;
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.retain(|id| id != connection_id);
            drop_room = members.is_empty();
        }
        if drop_room {
            self.rooms.remove(room);
        }

        if let Some(mut joined) = self.memberships.get_mut(connection_id) {
            joined.retain(|r| r != room);
        }

        debug!(connection_id = %connection_id, room = %room, "left room");
    }

    /// Drop a connection and every room membership it held
    pub fn disconnect(&self, connection_id: &str) {
        let joined = self
            .memberships
            .remove(connection_id)
            .map(|(_, rooms)| rooms)
            .unwrap_or_default();

        for room in &joined {
            let mut drop_room = false;
            if let Some(mut members) = self.rooms.get_mut(room) {
                members.retain(|id| id != connection_id);
                drop_room = members.is_empty();
            }
            if drop_room {
                self.rooms.remove(room);
            }
        }

        if self.connections.remove(connection_id).is_some() {
            info!(
                connection_id = %connection_id,
                rooms_left = joined.len(),
                remaining_connections = self.connections.len(),
                "gateway connection disconnected"
            );
        }
    }

    /// Deliver a message to every member of a room.
    ///
    /// Fire-and-forget: an empty room returns 0, and a member whose
    /// outbound queue is full is disconnected rather than stalling the
    /// sender. Returns the number of members reached.
    pub fn broadcast_to_room(&self, room: &str, message: ServerMessage) -> usize {
        let member_ids: Vec<ConnectionId> = self
            .rooms
            .get(room)
            .map(|ids| ids.clone())
            .unwrap_or_default();

        if member_ids.is_empty() {
            return 0;
        }

        let mut sent = 0;
        for connection_id in member_ids {
            let Some(connection) = self.connections.get(&connection_id).map(|c| c.clone()) else {
                continue;
            };
            match connection.sender.try_send(message.clone()) {
                Ok(()) => sent += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        connection_id = %connection_id,
                        room = %room,
                        "outbound queue full, disconnecting slow member"
                    );
                    self.disconnect(&connection_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.disconnect(&connection_id);
                }
            }
        }

        debug!(room = %room, sent_count = sent, "room broadcast");
        sent
    }

    /// Deliver a message to one connection; same overflow discipline as
    /// room broadcast. Returns false when the connection is gone.
    pub fn send_to_connection(&self, connection_id: &str, message: ServerMessage) -> bool {
        let Some(connection) = self.connections.get(connection_id).map(|c| c.clone()) else {
            return false;
        };
        match connection.sender.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    connection_id = %connection_id,
                    "outbound queue full, disconnecting slow connection"
                );
                self.disconnect(connection_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.disconnect(connection_id);
                false
            }
        }
    }

    /// Drop connections whose receiver side is gone
    pub fn cleanup_dead_connections(&self) {
        let dead: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| !entry.value().is_active())
            .map(|entry| entry.key().clone())
            .collect();

        for id in dead {
            self.disconnect(&id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|ids| ids.len()).unwrap_or(0)
    }

    /// Rooms a connection currently belongs to
    pub fn rooms_of(&self, connection_id: &str) -> Vec<String> {
        self.memberships
            .get(connection_id)
            .map(|rooms| rooms.clone())
            .unwrap_or_default()
    }
}
