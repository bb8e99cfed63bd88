//! Room registry and connection directory

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::Frame;

use super::duel::{DuelRoom, RoomCommand, RoomHandle};
use super::room::{JoinError, Slot};
use super::rules::DuelRules;

/// Opaque identity of one live socket
pub type ConnectionId = Uuid;

/// Registry of all live rooms, keyed by room id
pub struct RoomRegistry {
    rooms: Arc<DashMap<String, RoomHandle>>,
    rules: DuelRules,
}

impl RoomRegistry {
    pub fn new(rules: DuelRules) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            rules,
        }
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    /// Seat a connection in a room, creating the room on first use.
    ///
    /// A room that is shutting down drops queued joins; the join is then retried
    /// against a fresh room under the same id.
    pub async fn join(
        &self,
        room_id: &str,
        nickname: String,
        conn_id: ConnectionId,
        outbox: mpsc::Sender<Frame>,
    ) -> Result<Slot, JoinError> {
        loop {
            let handle = self.open(room_id);
            let (reply_tx, reply_rx) = oneshot::channel();
            let command = RoomCommand::Join {
                conn_id,
                nickname: nickname.clone(),
                outbox: outbox.clone(),
                reply: reply_tx,
            };

            if handle.commands.send(command).await.is_err() {
                self.evict(&handle);
                continue;
            }
            match reply_rx.await {
                Ok(result) => return result,
                Err(_) => {
                    debug!(room_id = %room_id, "Room closed during join, retrying");
                    self.evict(&handle);
                }
            }
        }
    }

    /// Forward a command to an existing room; commands for unknown rooms are dropped
    pub async fn send(&self, room_id: &str, command: RoomCommand) {
        let Some(handle) = self.get(room_id) else {
            debug!(room_id = %room_id, "Command for unknown room dropped");
            return;
        };
        if handle.commands.send(command).await.is_err() {
            debug!(room_id = %room_id, "Room closed, command dropped");
        }
    }

    /// Get the live room for an id, spawning its task if there is none
    fn open(&self, room_id: &str) -> RoomHandle {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| self.spawn_room(room_id))
            .value()
            .clone()
    }

    fn spawn_room(&self, room_id: &str) -> RoomHandle {
        let (duel, handle) = DuelRoom::new(room_id.to_string(), self.rules);
        let rooms = self.rooms.clone();
        let id = room_id.to_string();
        let instance = duel.instance();

        tokio::spawn(async move {
            duel.run().await;
            // Only remove our own entry; a newer room may already hold the id
            rooms.remove_if(&id, |_, h| h.instance == instance);
        });

        handle
    }

    fn evict(&self, handle: &RoomHandle) {
        self.rooms
            .remove_if(&handle.id, |_, h| h.instance == handle.instance);
    }
}

/// Where a connection sits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub room_id: String,
    pub slot: Slot,
}

/// Maps each live connection to its room and slot
pub struct ConnectionDirectory {
    seats: DashMap<ConnectionId, Seat>,
}

impl ConnectionDirectory {
    pub fn new() -> Self {
        Self {
            seats: DashMap::new(),
        }
    }

    pub fn assign(&self, conn_id: ConnectionId, seat: Seat) {
        self.seats.insert(conn_id, seat);
    }

    pub fn seat(&self, conn_id: &ConnectionId) -> Option<Seat> {
        self.seats.get(conn_id).map(|s| s.value().clone())
    }

    pub fn release(&self, conn_id: &ConnectionId) -> Option<Seat> {
        self.seats.remove(conn_id).map(|(_, seat)| seat)
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }
}

impl Default for ConnectionDirectory {
    fn default() -> Self {
        Self::new()
    }
}
