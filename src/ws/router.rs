//! Message router: validates inbound messages against the connection's seat
//! and dispatches them to the owning room task

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::game::{ConnectionDirectory, ConnectionId, RoomCommand, RoomRegistry, Seat, Slot};
use crate::ws::protocol::{ClientMsg, Frame};

/// Longest accepted room id, in bytes
const MAX_ROOM_ID_LEN: usize = 64;

/// Longest nickname kept, in characters
const MAX_NICKNAME_CHARS: usize = 24;

const DEFAULT_NICKNAME: &str = "Fencer";

#[derive(Clone)]
pub struct MessageRouter {
    rooms: Arc<RoomRegistry>,
    directory: Arc<ConnectionDirectory>,
}

impl MessageRouter {
    pub fn new(rooms: Arc<RoomRegistry>, directory: Arc<ConnectionDirectory>) -> Self {
        Self { rooms, directory }
    }

    /// Handle one parsed message from a connection
    pub async fn route(&self, conn_id: ConnectionId, msg: ClientMsg, outbox: &mpsc::Sender<Frame>) {
        match msg {
            ClientMsg::Join { room, nickname } => {
                self.join(conn_id, room, nickname, outbox).await;
            }
            ClientMsg::Move {
                room,
                player_id,
                x,
                y,
                facing_right,
                ..
            } => {
                if let Some(seat) = self.seat_for(conn_id, &room, player_id) {
                    let command = RoomCommand::Move {
                        conn_id,
                        slot: seat.slot,
                        x,
                        y,
                        facing_right,
                    };
                    self.rooms.send(&seat.room_id, command).await;
                }
            }
            ClientMsg::Attack {
                room, player_id, ..
            } => {
                if let Some(seat) = self.seat_for(conn_id, &room, player_id) {
                    let command = RoomCommand::Attack {
                        conn_id,
                        slot: seat.slot,
                    };
                    self.rooms.send(&seat.room_id, command).await;
                }
            }
            ClientMsg::Chat {
                room,
                player_id,
                chat,
            } => {
                if let Some(seat) = self.seat_for(conn_id, &room, player_id) {
                    let command = RoomCommand::Chat {
                        conn_id,
                        slot: seat.slot,
                        text: chat,
                    };
                    self.rooms.send(&seat.room_id, command).await;
                }
            }
        }
    }

    /// Vacate the connection's seat after its socket closed
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        let Some(seat) = self.directory.release(&conn_id) else {
            return;
        };

        info!(conn_id = %conn_id, room_id = %seat.room_id, slot = %seat.slot, "Releasing seat");
        self.rooms
            .send(
                &seat.room_id,
                RoomCommand::Leave {
                    conn_id,
                    slot: seat.slot,
                },
            )
            .await;
    }

    async fn join(
        &self,
        conn_id: ConnectionId,
        room: String,
        nickname: String,
        outbox: &mpsc::Sender<Frame>,
    ) {
        if let Some(seat) = self.directory.seat(&conn_id) {
            debug!(conn_id = %conn_id, room_id = %seat.room_id, "Already seated, join ignored");
            return;
        }
        let room = room.trim();
        if room.is_empty() || room.len() > MAX_ROOM_ID_LEN {
            debug!(conn_id = %conn_id, "Join with invalid room id ignored");
            return;
        }

        let nickname = sanitize_nickname(&nickname);
        if let Ok(slot) = self
            .rooms
            .join(room, nickname, conn_id, outbox.clone())
            .await
        {
            self.directory.assign(
                conn_id,
                Seat {
                    room_id: room.to_string(),
                    slot,
                },
            );
        }
    }

    /// The connection's seat, if the message addresses it
    fn seat_for(&self, conn_id: ConnectionId, room: &str, player_id: Slot) -> Option<Seat> {
        match self.directory.seat(&conn_id) {
            Some(seat) if seat.room_id == room.trim() && seat.slot == player_id => Some(seat),
            Some(_) => {
                debug!(conn_id = %conn_id, room_id = %room, "Message for foreign seat ignored");
                None
            }
            None => {
                debug!(conn_id = %conn_id, "Message from unseated connection ignored");
                None
            }
        }
    }
}

fn sanitize_nickname(raw: &str) -> String {
    let nickname: String = raw.trim().chars().take(MAX_NICKNAME_CHARS).collect();
    if nickname.is_empty() {
        DEFAULT_NICKNAME.to_string()
    } else {
        nickname
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::DuelRules;
    use serde_json::{json, Value};
    use std::time::Duration;
    use uuid::Uuid;

    struct Client {
        conn_id: ConnectionId,
        tx: mpsc::Sender<Frame>,
        rx: mpsc::Receiver<Frame>,
    }

    impl Client {
        fn new() -> Self {
            let (tx, rx) = mpsc::channel(64);
            Self {
                conn_id: Uuid::new_v4(),
                tx,
                rx,
            }
        }

        async fn send(&self, router: &MessageRouter, msg: Value) {
            let msg: ClientMsg = serde_json::from_value(msg).unwrap();
            router.route(self.conn_id, msg, &self.tx).await;
        }

        /// Wait for the next frame pushed by the room task
        async fn next(&mut self) -> Value {
            let frame = tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
                .await
                .expect("frame in time")
                .expect("outbox open");
            serde_json::from_str(&frame).unwrap()
        }

        async fn silent(&mut self) -> bool {
            tokio::time::timeout(Duration::from_millis(50), self.rx.recv())
                .await
                .is_err()
        }
    }

    fn router() -> (MessageRouter, Arc<RoomRegistry>, Arc<ConnectionDirectory>) {
        let rooms = Arc::new(RoomRegistry::new(DuelRules::default()));
        let directory = Arc::new(ConnectionDirectory::new());
        (
            MessageRouter::new(rooms.clone(), directory.clone()),
            rooms,
            directory,
        )
    }

    #[tokio::test]
    async fn join_assigns_slots_and_rejects_third() {
        let (router, _rooms, directory) = router();
        let (mut a, mut b, mut c) = (Client::new(), Client::new(), Client::new());

        a.send(&router, json!({"type": "join", "room": "r1", "nickname": "alice"})).await;
        assert_eq!(a.next().await, json!({"type": "assign", "playerId": "p1"}));

        b.send(&router, json!({"type": "join", "room": "r1", "nickname": "bob"})).await;
        assert_eq!(b.next().await, json!({"type": "assign", "playerId": "p2"}));

        c.send(&router, json!({"type": "join", "room": "r1", "nickname": "carol"})).await;
        assert_eq!(c.next().await, json!({"type": "error", "msg": "Room full"}));

        assert_eq!(directory.len(), 2);
        assert!(directory.seat(&c.conn_id).is_none());
    }

    #[tokio::test]
    async fn move_from_wrong_player_id_is_ignored() {
        let (router, _rooms, _directory) = router();
        let mut a = Client::new();

        a.send(&router, json!({"type": "join", "room": "r1", "nickname": "alice"})).await;
        a.next().await;
        a.next().await;

        a.send(
            &router,
            json!({"type": "move", "room": "r1", "playerId": "p2", "x": 1.0, "y": 1.0, "facingRight": true}),
        )
        .await;
        assert!(a.silent().await);

        a.send(
            &router,
            json!({"type": "move", "room": "r1", "playerId": "p1", "x": 130.0, "y": 300.0, "facingRight": true}),
        )
        .await;
        let state = a.next().await;
        assert_eq!(state["p1"]["x"], 130.0);
    }

    #[tokio::test]
    async fn disconnect_mid_match_keeps_opponent_and_rejoin_resets_scores() {
        let (router, rooms, directory) = router();
        let (mut a, mut b) = (Client::new(), Client::new());

        a.send(&router, json!({"type": "join", "room": "r1", "nickname": "alice"})).await;
        b.send(&router, json!({"type": "join", "room": "r1", "nickname": "bob"})).await;

        b.send(
            &router,
            json!({"type": "move", "room": "r1", "playerId": "p2", "x": 140.0, "y": 300.0, "facingRight": false}),
        )
        .await;
        a.send(&router, json!({"type": "attack", "room": "r1", "playerId": "p1"})).await;

        // assign, join snapshot, p2 join snapshot, move snapshot, attack snapshot
        let mut last = Value::Null;
        for _ in 0..5 {
            last = a.next().await;
        }
        assert_eq!(last["score1"], 1);

        router.disconnect(a.conn_id).await;
        assert!(directory.seat(&a.conn_id).is_none());

        // Skip b's assign and earlier snapshots until the one without p1
        let mut frame = b.next().await;
        while frame.get("type").is_some() || !frame["p1"].is_null() {
            frame = b.next().await;
        }
        assert!(frame.get("p1").is_some());
        assert_eq!(frame["p2"]["nickname"], "bob");
        assert_eq!(frame["score1"], 1);

        let mut c = Client::new();
        c.send(&router, json!({"type": "join", "room": "r1", "nickname": "carol"})).await;
        assert_eq!(c.next().await, json!({"type": "assign", "playerId": "p1"}));
        let state = c.next().await;
        assert_eq!(state["score1"], 0);
        assert_eq!(state["score2"], 0);
        assert_eq!(rooms.active_rooms(), 1);
    }

    #[tokio::test]
    async fn last_disconnect_destroys_room() {
        let (router, rooms, _directory) = router();
        let mut a = Client::new();

        a.send(&router, json!({"type": "join", "room": "solo", "nickname": ""})).await;
        a.next().await;
        let state = a.next().await;
        assert_eq!(state["p1"]["nickname"], DEFAULT_NICKNAME);

        router.disconnect(a.conn_id).await;
        for _ in 0..100 {
            if rooms.get("solo").is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(rooms.active_rooms(), 0);
    }

    #[tokio::test]
    async fn second_join_from_seated_connection_is_ignored() {
        let (router, rooms, directory) = router();
        let mut a = Client::new();

        a.send(&router, json!({"type": "join", "room": "r1", "nickname": "alice"})).await;
        a.next().await;
        a.next().await;

        a.send(&router, json!({"type": "join", "room": "r2", "nickname": "alice"})).await;
        assert!(a.silent().await);
        assert!(rooms.get("r2").is_none());
        assert_eq!(directory.seat(&a.conn_id).unwrap().room_id, "r1");
    }

    #[tokio::test]
    async fn chat_reaches_both_fencers() {
        let (router, _rooms, _directory) = router();
        let (mut a, mut b) = (Client::new(), Client::new());

        a.send(&router, json!({"type": "join", "room": "r1", "nickname": "alice"})).await;
        b.send(&router, json!({"type": "join", "room": "r1", "nickname": "bob"})).await;
        for _ in 0..3 {
            a.next().await;
        }
        for _ in 0..2 {
            b.next().await;
        }

        b.send(&router, json!({"type": "chat", "room": "r1", "playerId": "p2", "chat": "touché"})).await;

        let expected = json!({"type": "chat", "senderId": "p2", "nickname": "bob", "text": "touché"});
        assert_eq!(a.next().await, expected);
        assert_eq!(b.next().await, expected);
    }

    #[test]
    fn nicknames_are_trimmed_and_capped() {
        assert_eq!(sanitize_nickname("  zorro "), "zorro");
        assert_eq!(sanitize_nickname(""), DEFAULT_NICKNAME);
        assert_eq!(sanitize_nickname(&"x".repeat(100)).chars().count(), MAX_NICKNAME_CHARS);
    }
}
