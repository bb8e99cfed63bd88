//! Room state machine: two fencer slots, scores, attack timers and respawn lock
//!
//! Every operation takes the server-stamped `now` in milliseconds. Nothing here
//! performs I/O; the owning room task serializes all calls.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::combat::CombatSystem;
use super::rules::{DuelRules, Spawn};

/// One of the two fixed participant identities in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    #[serde(rename = "p1")]
    P1,
    #[serde(rename = "p2")]
    P2,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::P1, Slot::P2];

    pub fn index(self) -> usize {
        match self {
            Slot::P1 => 0,
            Slot::P2 => 1,
        }
    }

    pub fn opponent(self) -> Slot {
        match self {
            Slot::P1 => Slot::P2,
            Slot::P2 => Slot::P1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::P1 => "p1",
            Slot::P2 => "p2",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fencer occupying a slot (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub slot: Slot,
    pub nickname: String,
    pub x: f32,
    pub y: f32,
    pub facing_right: bool,
    /// Server stamp of the current attack; "attacking" is derived from it
    pub attack_started_at: Option<u64>,
}

impl Player {
    pub fn new(slot: Slot, nickname: String, spawn: Spawn) -> Self {
        Self {
            slot,
            nickname,
            x: spawn.x,
            y: spawn.y,
            facing_right: spawn.facing_right,
            attack_started_at: None,
        }
    }

    fn respawn(&mut self, spawn: Spawn) {
        self.x = spawn.x;
        self.y = spawn.y;
        self.facing_right = spawn.facing_right;
        self.attack_started_at = None;
    }
}

/// Join rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Room full")]
    RoomFull,
}

/// Result of applying a movement update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Position stored; `fresh` is true when it moved beyond the epsilon
    Applied { fresh: bool },
    /// Dropped by the respawn lock; state should still be rebroadcast
    Locked,
    /// Slot is empty
    Ignored,
}

impl MoveOutcome {
    /// Whether the sender's slot exists, so the room should rebroadcast
    pub fn accepted(self) -> bool {
        !matches!(self, MoveOutcome::Ignored)
    }
}

/// A touch that changed the score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEvent {
    pub scorer: Slot,
    pub scores: [u32; 2],
    /// Set when this touch reached the winning score
    pub match_winner: Option<Slot>,
}

/// Per-room mutable duel state
#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    rules: DuelRules,
    players: [Option<Player>; 2],
    scores: [u32; 2],
    /// Priority stamps for simultaneous touches
    last_input: [u64; 2],
    respawn_lock_until: u64,
    last_score_at: Option<u64>,
    match_started_at: u64,
    winner: Option<Slot>,
}

impl Room {
    pub fn new(id: impl Into<String>, rules: DuelRules, now: u64) -> Self {
        Self {
            id: id.into(),
            rules,
            players: [None, None],
            scores: [0, 0],
            last_input: [0, 0],
            respawn_lock_until: 0,
            last_score_at: None,
            match_started_at: now,
            winner: None,
        }
    }

    pub fn rules(&self) -> &DuelRules {
        &self.rules
    }

    pub fn player(&self, slot: Slot) -> Option<&Player> {
        self.players[slot.index()].as_ref()
    }

    pub fn scores(&self) -> [u32; 2] {
        self.scores
    }

    pub fn match_started_at(&self) -> u64 {
        self.match_started_at
    }

    pub fn occupied(&self) -> usize {
        self.players.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    #[cfg(test)]
    pub fn last_input(&self, slot: Slot) -> u64 {
        self.last_input[slot.index()]
    }

    #[cfg(test)]
    pub fn respawn_lock_until(&self) -> u64 {
        self.respawn_lock_until
    }

    #[cfg(test)]
    pub fn winner(&self) -> Option<Slot> {
        self.winner
    }

    #[cfg(test)]
    pub fn is_attacking(&self, slot: Slot, now: u64) -> bool {
        self.player(slot)
            .map(|p| CombatSystem::is_attacking(&self.rules, p.attack_started_at, now))
            .unwrap_or(false)
    }

    /// Seat a fencer in the first free slot.
    ///
    /// Filling a vacant slot always starts a fresh match: scores, winner and
    /// the score debounce are cleared.
    pub fn join(&mut self, nickname: String, now: u64) -> Result<Slot, JoinError> {
        let slot = Slot::ALL
            .into_iter()
            .find(|slot| self.players[slot.index()].is_none())
            .ok_or(JoinError::RoomFull)?;

        let spawn = self.rules.spawn_for(slot);
        self.players[slot.index()] = Some(Player::new(slot, nickname, spawn));
        self.last_input[slot.index()] = 0;

        self.scores = [0, 0];
        self.winner = None;
        self.last_score_at = None;
        self.match_started_at = now;

        Ok(slot)
    }

    /// Vacate a slot. Returns true when the room is now empty.
    pub fn leave(&mut self, slot: Slot) -> bool {
        self.players[slot.index()] = None;
        self.last_input[slot.index()] = 0;
        self.is_empty()
    }

    /// Apply a position/facing update from the slot's owner
    pub fn apply_move(
        &mut self,
        slot: Slot,
        x: f32,
        y: f32,
        facing_right: bool,
        now: u64,
    ) -> MoveOutcome {
        if !x.is_finite() || !y.is_finite() {
            return MoveOutcome::Ignored;
        }
        let epsilon = self.rules.move_epsilon;
        let locked = now < self.respawn_lock_until;
        let Some(player) = self.players[slot.index()].as_mut() else {
            return MoveOutcome::Ignored;
        };
        if locked {
            return MoveOutcome::Locked;
        }

        let fresh = (player.x - x).abs() > epsilon || (player.y - y).abs() > epsilon;
        player.x = x;
        player.y = y;
        player.facing_right = facing_right;

        // Keepalives must not win priority ties
        if fresh {
            self.last_input[slot.index()] = now;
        }

        MoveOutcome::Applied { fresh }
    }

    /// Start an attack. Re-entrant attacks inside an open window are ignored.
    pub fn apply_attack(&mut self, slot: Slot, now: u64) -> bool {
        let rules = self.rules;
        let Some(player) = self.players[slot.index()].as_mut() else {
            return false;
        };
        if CombatSystem::is_attacking(&rules, player.attack_started_at, now) {
            return false;
        }

        player.attack_started_at = Some(now);
        self.last_input[slot.index()] = now;
        true
    }

    /// Run the hit resolver and apply scoring side effects
    pub fn evaluate_hits(&mut self, now: u64) -> Option<ScoreEvent> {
        if self.winner.is_some() {
            return None;
        }

        let scorer =
            CombatSystem::resolve_exchange(&self.rules, &self.players, &self.last_input, now)?;

        // Duplicate evaluations of the same logical touch
        if let Some(last) = self.last_score_at {
            if now.saturating_sub(last) < self.rules.score_debounce_ms {
                return None;
            }
        }

        self.scores[scorer.index()] = self.scores[scorer.index()].saturating_add(1);
        self.last_score_at = Some(now);

        for slot in Slot::ALL {
            let spawn = self.rules.spawn_for(slot);
            if let Some(player) = self.players[slot.index()].as_mut() {
                player.respawn(spawn);
            }
        }
        self.respawn_lock_until = now.saturating_add(self.rules.respawn_lock_ms);

        if self.scores[scorer.index()] >= self.rules.win_score {
            self.winner = Some(scorer);
        }

        Some(ScoreEvent {
            scorer,
            scores: self.scores,
            match_winner: self.winner,
        })
    }
}
