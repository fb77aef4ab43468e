//! services/api/src/adapters/broadcaster.rs
//!
//! The room broadcaster: an explicit registry of live connections and of the
//! rooms (one per lecture) they have joined. It implements the `EventPublisher`
//! port so the core's event bridge can fan events out to a room.

use async_trait::async_trait;
use classroom_core::events::RoomEvent;
use classroom_core::ports::{EventPublisher, PortResult};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::web::protocol::ServerMessage;

/// Identifies one persistent connection for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle used to push messages to a connected client.
struct Connection {
    tx: mpsc::UnboundedSender<ServerMessage>,
    rooms: HashSet<Uuid>,
}

/// Room membership table. Create one per process (or per test) and share it
/// through an `Arc`.
#[derive(Default)]
pub struct RoomRegistry {
    next_id: AtomicU64,
    connections: DashMap<ConnectionId, Connection>,
    rooms: DashMap<Uuid, HashSet<ConnectionId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection. Everything published to rooms it joins, and
    /// every direct reply, arrives on the returned receiver in order.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(
            id,
            Connection {
                tx,
                rooms: HashSet::new(),
            },
        );
        debug!("Registered connection {}", id);
        (id, rx)
    }

    /// Adds the connection to a room. Joining twice is a no-op.
    /// Returns `false` if the connection is unknown.
    pub fn join(&self, conn: ConnectionId, lecture_id: Uuid) -> bool {
        match self.connections.get_mut(&conn) {
            Some(mut connection) => {
                connection.rooms.insert(lecture_id);
            }
            None => return false,
        }
        self.rooms.entry(lecture_id).or_default().insert(conn);
        debug!("Connection {} joined room {}", conn, lecture_id);
        true
    }

    /// Removes the connection from a room. Leaving a room one is not in is a no-op.
    pub fn leave(&self, conn: ConnectionId, lecture_id: Uuid) {
        if let Some(mut connection) = self.connections.get_mut(&conn) {
            connection.rooms.remove(&lecture_id);
        }
        self.remove_member(lecture_id, conn);
        debug!("Connection {} left room {}", conn, lecture_id);
    }

    /// Drops the connection and all of its memberships.
    pub fn disconnect(&self, conn: ConnectionId) {
        if let Some((_, connection)) = self.connections.remove(&conn) {
            for lecture_id in connection.rooms {
                self.remove_member(lecture_id, conn);
            }
            debug!("Connection {} removed", conn);
        }
    }

    /// Sends a message to every member of the room and returns how many were
    /// reached. The room entry stays locked for the whole fan-out, so every
    /// member observes publishes to one room in the same order. Members whose
    /// receiving side is gone are skipped silently.
    pub fn publish_to_room(&self, lecture_id: Uuid, message: ServerMessage) -> usize {
        let Some(members) = self.rooms.get_mut(&lecture_id) else {
            return 0;
        };
        let mut delivered = 0;
        for conn in members.iter() {
            let Some(connection) = self.connections.get(conn) else {
                continue;
            };
            if connection.tx.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!("Dropped event for closed connection {}", conn);
            }
        }
        delivered
    }

    /// Sends a message to one connection only. Returns `false` if it is gone.
    pub fn send_to(&self, conn: ConnectionId, message: ServerMessage) -> bool {
        self.connections
            .get(&conn)
            .map(|connection| connection.tx.send(message).is_ok())
            .unwrap_or(false)
    }

    pub fn members(&self, lecture_id: Uuid) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self
            .rooms
            .get(&lecture_id)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn remove_member(&self, lecture_id: Uuid, conn: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(&lecture_id) {
            members.remove(&conn);
        }
        self.rooms.remove_if(&lecture_id, |_, members| members.is_empty());
    }
}

#[async_trait]
impl EventPublisher for RoomRegistry {
    async fn publish(&self, event: RoomEvent) -> PortResult<()> {
        let lecture_id = event.lecture_id;
        let kind = event.kind;
        let delivered = self.publish_to_room(lecture_id, ServerMessage::from(event));
        debug!("{} delivered to {} member(s) of room {}", kind, delivered, lecture_id);
        Ok(())
    }
}
