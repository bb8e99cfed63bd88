//! Room task: the single writer for one room's state
//!
//! Connections never touch a `Room` directly. They push `RoomCommand`s into the
//! room's mailbox; the task stamps each command from the monotonic clock, applies it,
//! evaluates hits and fans the resulting snapshot out to every member's outbox.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::util::time::{monotonic_millis, WallAnchor};
use crate::ws::protocol::{encode, Frame, ServerMsg};

use super::registry::ConnectionId;
use super::room::{JoinError, MoveOutcome, Room, ScoreEvent, Slot};
use super::rules::DuelRules;
use super::snapshot::SnapshotBuilder;

/// Mailbox depth per room
const COMMAND_CAPACITY: usize = 256;

/// Longest chat line relayed, in characters
const MAX_CHAT_CHARS: usize = 200;

/// Commands accepted by a room task
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        conn_id: ConnectionId,
        nickname: String,
        outbox: mpsc::Sender<Frame>,
        reply: oneshot::Sender<Result<Slot, JoinError>>,
    },
    Move {
        conn_id: ConnectionId,
        slot: Slot,
        x: f32,
        y: f32,
        facing_right: bool,
    },
    Attack {
        conn_id: ConnectionId,
        slot: Slot,
    },
    Chat {
        conn_id: ConnectionId,
        slot: Slot,
        text: String,
    },
    Leave {
        conn_id: ConnectionId,
        slot: Slot,
    },
}

/// Handle to a running room task
#[derive(Clone, Debug)]
pub struct RoomHandle {
    pub id: String,
    /// Distinguishes successive rooms that reuse the same id
    pub instance: Uuid,
    pub commands: mpsc::Sender<RoomCommand>,
}

/// A connection receiving this room's broadcasts
struct Member {
    slot: Slot,
    outbox: mpsc::Sender<Frame>,
}

/// The authoritative duel room
pub struct DuelRoom {
    room: Room,
    instance: Uuid,
    /// Maps room stamps to wall-clock time for clients
    clock: WallAnchor,
    commands: mpsc::Receiver<RoomCommand>,
    members: HashMap<ConnectionId, Member>,
}

impl DuelRoom {
    /// Create a new room task and its handle
    pub fn new(id: String, rules: DuelRules) -> (Self, RoomHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let instance = Uuid::new_v4();

        let handle = RoomHandle {
            id: id.clone(),
            instance,
            commands: command_tx,
        };

        let clock = WallAnchor::now();
        let duel = Self {
            room: Room::new(id, rules, monotonic_millis()),
            instance,
            clock,
            commands: command_rx,
            members: HashMap::new(),
        };

        (duel, handle)
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// Process commands until the room empties
    pub async fn run(mut self) {
        info!(room_id = %self.room.id, instance = %self.instance, "Room opened");

        while let Some(command) = self.commands.recv().await {
            let emptied = self.handle_command(command, monotonic_millis());
            if emptied {
                break;
            }
        }

        // Refuse new commands; queued joins see their reply dropped and retry elsewhere
        self.commands.close();
        let mut discarded = 0usize;
        while self.commands.try_recv().is_ok() {
            discarded += 1;
        }

        info!(
            room_id = %self.room.id,
            instance = %self.instance,
            discarded,
            "Room closed"
        );
    }

    /// Apply one command. Returns true when the room has become empty.
    fn handle_command(&mut self, command: RoomCommand, now: u64) -> bool {
        match command {
            RoomCommand::Join {
                conn_id,
                nickname,
                outbox,
                reply,
            } => {
                let result = self.handle_join(conn_id, nickname, outbox, now);
                let _ = reply.send(result);
                false
            }
            RoomCommand::Move {
                conn_id,
                slot,
                x,
                y,
                facing_right,
            } => {
                if !self.is_member(conn_id, slot) {
                    debug!(
                        room_id = %self.room.id,
                        conn_id = %conn_id,
                        "Move from non-member ignored"
                    );
                    return false;
                }
                let outcome = self.room.apply_move(slot, x, y, facing_right, now);
                if let MoveOutcome::Applied { fresh: true } = outcome {
                    trace!(room_id = %self.room.id, slot = %slot, x, y, "Fencer moved");
                }
                if outcome.accepted() {
                    self.resolve_and_broadcast(now);
                }
                false
            }
            RoomCommand::Attack { conn_id, slot } => {
                if !self.is_member(conn_id, slot) {
                    debug!(
                        room_id = %self.room.id,
                        conn_id = %conn_id,
                        "Attack from non-member ignored"
                    );
                    return false;
                }
                if self.room.apply_attack(slot, now) {
                    debug!(room_id = %self.room.id, slot = %slot, "Attack started");
                    self.resolve_and_broadcast(now);
                }
                false
            }
            RoomCommand::Chat {
                conn_id,
                slot,
                text,
            } => {
                if self.is_member(conn_id, slot) {
                    self.handle_chat(slot, &text);
                }
                false
            }
            RoomCommand::Leave { conn_id, slot } => self.handle_leave(conn_id, slot, now),
        }
    }

    fn is_member(&self, conn_id: ConnectionId, slot: Slot) -> bool {
        self.members
            .get(&conn_id)
            .map(|m| m.slot == slot)
            .unwrap_or(false)
    }

    fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        nickname: String,
        outbox: mpsc::Sender<Frame>,
        now: u64,
    ) -> Result<Slot, JoinError> {
        if let Some(member) = self.members.get(&conn_id) {
            warn!(room_id = %self.room.id, conn_id = %conn_id, "Connection already seated");
            return Ok(member.slot);
        }

        match self.room.join(nickname, now) {
            Ok(slot) => {
                if let Some(frame) = encode(&ServerMsg::Assign { player_id: slot }) {
                    deliver(&self.room.id, conn_id, &outbox, frame);
                }
                self.members.insert(conn_id, Member { slot, outbox });

                info!(
                    room_id = %self.room.id,
                    conn_id = %conn_id,
                    slot = %slot,
                    occupied = self.room.occupied(),
                    "Player joined room"
                );

                self.broadcast_state(now);
                Ok(slot)
            }
            Err(e) => {
                warn!(room_id = %self.room.id, conn_id = %conn_id, "Join rejected: {}", e);
                if let Some(frame) = encode(&ServerMsg::Error { msg: e.to_string() }) {
                    deliver(&self.room.id, conn_id, &outbox, frame);
                }
                Err(e)
            }
        }
    }

    fn handle_leave(&mut self, conn_id: ConnectionId, slot: Slot, now: u64) -> bool {
        if !self.is_member(conn_id, slot) {
            return false;
        }
        self.members.remove(&conn_id);
        let emptied = self.room.leave(slot);

        info!(
            room_id = %self.room.id,
            conn_id = %conn_id,
            slot = %slot,
            occupied = self.room.occupied(),
            "Player left room"
        );

        if !emptied {
            self.broadcast_state(now);
        }
        emptied
    }

    fn handle_chat(&self, slot: Slot, text: &str) {
        let text: String = text.trim().chars().take(MAX_CHAT_CHARS).collect();
        if text.is_empty() {
            return;
        }
        let Some(player) = self.room.player(slot) else {
            return;
        };

        let msg = ServerMsg::Chat {
            sender_id: slot,
            nickname: player.nickname.clone(),
            text,
        };
        if let Some(frame) = encode(&msg) {
            self.broadcast(frame);
        }
    }

    /// Hit evaluation followed by the state broadcast (and match-over, if reached)
    fn resolve_and_broadcast(&mut self, now: u64) {
        let event = self.room.evaluate_hits(now);
        if let Some(event) = event {
            self.log_score(&event);
        }

        self.broadcast_state(now);

        if let Some(ScoreEvent {
            match_winner: Some(winner),
            scores,
            ..
        }) = event
        {
            info!(room_id = %self.room.id, winner = %winner, "Match over");
            let msg = ServerMsg::MatchOver {
                winner_id: winner,
                score1: scores[Slot::P1.index()],
                score2: scores[Slot::P2.index()],
            };
            if let Some(frame) = encode(&msg) {
                self.broadcast(frame);
            }
        }
    }

    fn log_score(&self, event: &ScoreEvent) {
        info!(
            room_id = %self.room.id,
            scorer = %event.scorer,
            score1 = event.scores[Slot::P1.index()],
            score2 = event.scores[Slot::P2.index()],
            "Touch scored"
        );
    }

    fn broadcast_state(&self, now: u64) {
        let snapshot = SnapshotBuilder::build(&self.room, now, &self.clock);
        if let Some(frame) = encode(&snapshot) {
            self.broadcast(frame);
        }
    }

    /// Push one frame to every member. Failures are logged, never acted on.
    fn broadcast(&self, frame: Frame) {
        for (conn_id, member) in &self.members {
            deliver(&self.room.id, *conn_id, &member.outbox, frame.clone());
        }
    }
}

fn deliver(room_id: &str, conn_id: ConnectionId, outbox: &mpsc::Sender<Frame>, frame: Frame) {
    match outbox.try_send(frame) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(room_id = %room_id, conn_id = %conn_id, "Outbox full, dropping frame");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(room_id = %room_id, conn_id = %conn_id, "Outbox closed, dropping frame");
        }
    }
}
