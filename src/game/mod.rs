//! Duel simulation modules

pub mod combat;
pub mod duel;
pub mod registry;
pub mod room;
pub mod rules;
pub mod snapshot;

pub use duel::RoomCommand;
pub use registry::{ConnectionDirectory, ConnectionId, RoomRegistry, Seat};
pub use room::Slot;
pub use rules::DuelRules;
