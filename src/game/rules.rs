//! Duel constants: timing windows, blade geometry and spawn transforms

use super::room::Slot;

/// Fixed starting position and facing for a slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spawn {
    pub x: f32,
    pub y: f32,
    pub facing_right: bool,
}

/// Tunable duel rules shared by every room
#[derive(Debug, Clone, Copy)]
pub struct DuelRules {
    /// How long an attack stays hit-capable (ms)
    pub attack_window_ms: u64,
    /// Distance from the body to the blade tip at rest
    pub base_reach: f32,
    /// Extra reach at the peak of the lunge
    pub max_extend: f32,
    /// Horizontal distance between tip and defender that still counts as a touch
    pub x_tolerance: f32,
    /// Vertical distance between fencers that still counts as a touch
    pub y_tolerance: f32,
    /// Minimum gap between two score events (ms)
    pub score_debounce_ms: u64,
    /// Position updates are ignored for this long after a touch (ms)
    pub respawn_lock_ms: u64,
    /// Touches needed to win the match
    pub win_score: u32,
    /// Smallest movement that counts as fresh input for hit priority
    pub move_epsilon: f32,
    pub p1_spawn: Spawn,
    pub p2_spawn: Spawn,
}

impl Default for DuelRules {
    fn default() -> Self {
        Self {
            attack_window_ms: 300,
            base_reach: 40.0,
            max_extend: 40.0,
            x_tolerance: 15.0,
            y_tolerance: 40.0,
            score_debounce_ms: 300,
            respawn_lock_ms: 500,
            win_score: 5,
            move_epsilon: 0.5,
            p1_spawn: Spawn {
                x: 100.0,
                y: 300.0,
                facing_right: true,
            },
            p2_spawn: Spawn {
                x: 700.0,
                y: 300.0,
                facing_right: false,
            },
        }
    }
}

impl DuelRules {
    pub fn spawn_for(&self, slot: Slot) -> Spawn {
        match slot {
            Slot::P1 => self.p1_spawn,
            Slot::P2 => self.p2_spawn,
        }
    }
}
