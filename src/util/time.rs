//! Time utilities for the duel state machine

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking and monotonic stamps
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Milliseconds on a clock that never steps backwards. Used for all room timing.
pub fn monotonic_millis() -> u64 {
    SERVER_START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis() as u64
}

/// Pins monotonic stamps to the wall clock, for values that leave the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallAnchor {
    mono: u64,
    wall: u64,
}

impl WallAnchor {
    pub const fn new(mono: u64, wall: u64) -> Self {
        Self { mono, wall }
    }

    /// Anchor taken right now
    pub fn now() -> Self {
        Self::new(monotonic_millis(), unix_millis())
    }

    /// Wall-clock milliseconds for a monotonic stamp
    pub fn to_wall(&self, mono: u64) -> u64 {
        if mono >= self.mono {
            self.wall.saturating_add(mono - self.mono)
        } else {
            self.wall.saturating_sub(self.mono - mono)
        }
    }
}
