//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::game::Slot;

/// A serialized text frame, shared between every recipient of a broadcast
pub type Frame = Arc<str>;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request a slot in a room
    Join {
        room: String,
        #[serde(default)]
        nickname: String,
    },

    /// Position/facing report, sent by clients every frame
    #[serde(rename_all = "camelCase")]
    Move {
        room: String,
        player_id: Slot,
        x: f32,
        y: f32,
        facing_right: bool,
        /// Advisory only; the server derives attacking from its own stamps
        #[serde(default)]
        attacking: bool,
    },

    /// Start a lunge. Position fields are advisory; the stored position is used.
    #[serde(rename_all = "camelCase")]
    Attack {
        room: String,
        player_id: Slot,
        #[serde(default)]
        x: Option<f32>,
        #[serde(default)]
        y: Option<f32>,
        #[serde(default)]
        facing_right: Option<bool>,
    },

    /// Chat line for the room
    #[serde(rename_all = "camelCase")]
    Chat {
        room: String,
        player_id: Slot,
        chat: String,
    },
}

/// Tagged messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Join accepted
    #[serde(rename_all = "camelCase")]
    Assign { player_id: Slot },

    /// Join rejected
    Error { msg: String },

    /// Chat line relayed to the room
    #[serde(rename_all = "camelCase")]
    Chat {
        sender_id: Slot,
        nickname: String,
        text: String,
    },

    /// A fencer reached the winning score
    #[serde(rename_all = "camelCase")]
    MatchOver {
        winner_id: Slot,
        score1: u32,
        score2: u32,
    },
}

/// Untagged room state, broadcast after every accepted mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub room: String,
    pub p1: Option<PlayerSnapshot>,
    pub p2: Option<PlayerSnapshot>,
    pub score1: u32,
    pub score2: u32,
    pub game_start_time: u64,
}

/// Fencer state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: Slot,
    pub nickname: String,
    pub x: f32,
    pub y: f32,
    pub facing_right: bool,
    pub attacking: bool,
}

/// Serialize an outbound message into a shareable frame
pub fn encode<T: Serialize>(msg: &T) -> Option<Frame> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            error!(error = %e, "Failed to serialize outbound message");
            None
        }
    }
}
