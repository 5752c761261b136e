//! Room transport coordinator.
//!
//! Live fan-out only: the registry holds no durable state and can be
//! restarted without data loss, because every message is independently
//! appended to the message store. Delivery order is best-effort FIFO per
//! `publish` call; the store's `(created_at, id)` order stays authoritative.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod message_types;

/// Unique identifier for a live connection. Assigned when the WebSocket
/// session is created and used for precise cleanup on disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

struct Member {
    id: ConnectionId,
    sender: UnboundedSender<String>,
}

struct Connection {
    sender: UnboundedSender<String>,
    /// At most one room per connection in this domain; joining another room
    /// implicitly leaves this one.
    room: Option<String>,
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<String, Vec<Member>>,
    connections: HashMap<ConnectionId, Connection>,
}

impl Inner {
    fn remove_from_room(&mut self, room_id: &str, conn: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(room_id) {
            members.retain(|m| m.id != conn);
            if members.is_empty() {
                self.rooms.remove(room_id);
            }
        }
    }
}

/// Registry of live connections and room membership. All mutation goes
/// through one lock; every operation is short and never blocks on I/O.
#[derive(Default, Clone)]
pub struct RoomRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and get the channel its session drains.
    pub async fn register(&self, conn: ConnectionId) -> UnboundedReceiver<String> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard.connections.insert(
            conn,
            Connection {
                sender: tx,
                room: None,
            },
        );
        tracing::debug!(connection = %conn, total = guard.connections.len(), "connection registered");
        rx
    }

    /// Join a room, implicitly leaving the previous one. Succeeds even when
    /// no other party is connected; a no-op for unknown (already
    /// disconnected) connections, so a racing disconnect is safe.
    pub async fn join(&self, conn: ConnectionId, room_id: &str) {
        let mut guard = self.inner.write().await;

        let (sender, previous) = match guard.connections.get_mut(&conn) {
            Some(c) => (c.sender.clone(), c.room.replace(room_id.to_string())),
            None => {
                tracing::debug!(connection = %conn, "join after disconnect ignored");
                return;
            }
        };

        if let Some(previous) = previous {
            if previous == room_id {
                return;
            }
            guard.remove_from_room(&previous, conn);
        }

        guard
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .push(Member { id: conn, sender });
        tracing::debug!(connection = %conn, room = %room_id, "joined room");
    }

    /// Leave the current room; the connection stays registered.
    pub async fn leave(&self, conn: ConnectionId) {
        let mut guard = self.inner.write().await;
        let room = match guard.connections.get_mut(&conn) {
            Some(c) => c.room.take(),
            None => None,
        };
        if let Some(room) = room {
            guard.remove_from_room(&room, conn);
            tracing::debug!(connection = %conn, room = %room, "left room");
        }
    }

    /// Fan a payload out to every current member of a room, at most once
    /// each. Dead senders are pruned on the spot. Returns the number of
    /// connections the payload was handed to.
    pub async fn publish(&self, room_id: &str, payload: String) -> usize {
        let mut guard = self.inner.write().await;
        let Some(members) = guard.rooms.get_mut(room_id) else {
            return 0;
        };

        let before = members.len();
        members.retain(|m| m.sender.send(payload.clone()).is_ok());
        let delivered = members.len();
        if delivered < before {
            tracing::debug!(
                room = %room_id,
                pruned = before - delivered,
                "pruned dead members during publish"
            );
        }
        if members.is_empty() {
            guard.rooms.remove(room_id);
        }
        delivered
    }

    /// Tear down a connection: implicit leave plus removal of the
    /// registration itself. Idempotent and safe mid-join; no membership
    /// entry may survive it.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let mut guard = self.inner.write().await;
        let Some(connection) = guard.connections.remove(&conn) else {
            return;
        };
        if let Some(room) = connection.room {
            guard.remove_from_room(&room, conn);
        }
        tracing::debug!(connection = %conn, remaining = guard.connections.len(), "disconnected");
    }

    /// Current member count of a room.
    pub async fn room_size(&self, room_id: &str) -> usize {
        let guard = self.inner.read().await;
        guard.rooms.get(room_id).map(|m| m.len()).unwrap_or(0)
    }
}
