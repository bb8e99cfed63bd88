//! Snapshot building for network transmission

use crate::util::time::WallAnchor;
use crate::ws::protocol::{PlayerSnapshot, StateSnapshot};

use super::combat::CombatSystem;
use super::room::{Room, Slot};

/// Builds state snapshots from a room
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Copy the room into a wire snapshot. `attacking` is recomputed against `now`;
    /// the match start leaves as wall-clock time through `clock`.
    pub fn build(room: &Room, now: u64, clock: &WallAnchor) -> StateSnapshot {
        let scores = room.scores();

        StateSnapshot {
            room: room.id.clone(),
            p1: Self::player(room, Slot::P1, now),
            p2: Self::player(room, Slot::P2, now),
            score1: scores[Slot::P1.index()],
            score2: scores[Slot::P2.index()],
            game_start_time: clock.to_wall(room.match_started_at()),
        }
    }

    fn player(room: &Room, slot: Slot, now: u64) -> Option<PlayerSnapshot> {
        room.player(slot).map(|p| PlayerSnapshot {
            id: p.slot,
            nickname: p.nickname.clone(),
            x: p.x,
            y: p.y,
            facing_right: p.facing_right,
            attacking: CombatSystem::is_attacking(room.rules(), p.attack_started_at, now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rules::DuelRules;

    const CLOCK: WallAnchor = WallAnchor::new(0, 1_700_000_000_000);

    #[test]
    fn attacking_is_time_correct_for_late_observers() {
        let mut room = Room::new("r1", DuelRules::default(), 0);
        room.join("alice".into(), 0).unwrap();
        room.apply_attack(Slot::P1, 1_000);

        let during = SnapshotBuilder::build(&room, 1_100, &CLOCK);
        let expired = 1_000 + room.rules().attack_window_ms + 1;
        let after = SnapshotBuilder::build(&room, expired, &CLOCK);

        assert!(during.p1.as_ref().unwrap().attacking);
        assert!(!after.p1.as_ref().unwrap().attacking);
        assert!(after.p2.is_none());
    }

    #[test]
    fn identical_keepalives_yield_identical_snapshots() {
        let mut room = Room::new("r1", DuelRules::default(), 0);
        room.join("alice".into(), 0).unwrap();
        room.join("bob".into(), 0).unwrap();

        room.apply_move(Slot::P1, 100.0, 300.0, true, 500);
        let first = SnapshotBuilder::build(&room, 500, &CLOCK);
        room.apply_move(Slot::P1, 100.0, 300.0, true, 500);
        let second = SnapshotBuilder::build(&room, 500, &CLOCK);

        assert_eq!(first, second);
        assert_eq!(room.last_input(Slot::P1), 0);
    }

    #[test]
    fn replaying_snapshots_reconstructs_server_positions() {
        let mut room = Room::new("r1", DuelRules::default(), 0);
        room.join("alice".into(), 0).unwrap();
        room.join("bob".into(), 0).unwrap();

        let moves = [
            (Slot::P1, 120.0, 300.0, true),
            (Slot::P2, 650.0, 310.0, false),
            (Slot::P1, 150.0, 300.0, false),
            (Slot::P2, 600.0, 300.0, false),
        ];

        let mut replica: [Option<(f32, f32, bool)>; 2] = [None, None];
        let mut scores = (0, 0);
        for (i, (slot, x, y, facing)) in moves.into_iter().enumerate() {
            let now = 100 + i as u64 * 16;
            room.apply_move(slot, x, y, facing, now);
            let snap = SnapshotBuilder::build(&room, now, &CLOCK);
            replica[0] = snap.p1.map(|p| (p.x, p.y, p.facing_right));
            replica[1] = snap.p2.map(|p| (p.x, p.y, p.facing_right));
            scores = (snap.score1, snap.score2);
        }

        for slot in Slot::ALL {
            let server = room.player(slot).unwrap();
            assert_eq!(
                replica[slot.index()],
                Some((server.x, server.y, server.facing_right))
            );
        }
        assert_eq!(scores, (room.scores()[0], room.scores()[1]));
    }

    #[test]
    fn match_start_is_reported_in_wall_clock_time() {
        let mut room = Room::new("r1", DuelRules::default(), 0);
        room.join("alice".into(), 2_500).unwrap();

        let snap = SnapshotBuilder::build(&room, 2_600, &CLOCK);

        assert_eq!(snap.game_start_time, 1_700_000_002_500);
    }
}
