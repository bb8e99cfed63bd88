//! Combat system - attack windows, blade geometry, hit detection

use super::room::{Player, Slot};
use super::rules::DuelRules;

/// Combat system for evaluating touches
pub struct CombatSystem;

impl CombatSystem {
    /// Milliseconds since the attack started, or None when no attack window is open
    pub fn attack_elapsed(rules: &DuelRules, started_at: Option<u64>, now: u64) -> Option<u64> {
        let started_at = started_at?;
        let elapsed = now.saturating_sub(started_at);
        (elapsed <= rules.attack_window_ms).then_some(elapsed)
    }

    /// Derived "attacking" flag; never stored
    pub fn is_attacking(rules: &DuelRules, started_at: Option<u64>, now: u64) -> bool {
        Self::attack_elapsed(rules, started_at, now).is_some()
    }

    /// Forward extension of the blade: rises to `max_extend` at mid-window, then falls back
    pub fn blade_offset(rules: &DuelRules, elapsed: u64) -> f32 {
        let window = rules.attack_window_ms as f32;
        let half = window / 2.0;
        let t = (elapsed as f32).clamp(0.0, window);

        if half <= 0.0 {
            return 0.0;
        }
        if t <= half {
            rules.max_extend * (t / half)
        } else {
            rules.max_extend * ((window - t) / half)
        }
    }

    /// Horizontal position of the blade tip
    pub fn tip_x(rules: &DuelRules, x: f32, facing_right: bool, elapsed: u64) -> f32 {
        let reach = rules.base_reach + Self::blade_offset(rules, elapsed);
        if facing_right {
            x + reach
        } else {
            x - reach
        }
    }

    /// Check whether the attacker's blade touches the defender right now
    pub fn lands_hit(rules: &DuelRules, attacker: &Player, defender: &Player, now: u64) -> bool {
        let Some(elapsed) = Self::attack_elapsed(rules, attacker.attack_started_at, now) else {
            return false;
        };

        let tip = Self::tip_x(rules, attacker.x, attacker.facing_right, elapsed);
        (tip - defender.x).abs() < rules.x_tolerance
            && (attacker.y - defender.y).abs() < rules.y_tolerance
    }

    /// Attackers ordered by hit priority: most recent input first, P1 on ties
    pub fn priority_order(last_input: &[u64; 2]) -> [Slot; 2] {
        if last_input[Slot::P2.index()] > last_input[Slot::P1.index()] {
            [Slot::P2, Slot::P1]
        } else {
            [Slot::P1, Slot::P2]
        }
    }

    /// Evaluate both fencers and return the single slot that scores, if any.
    ///
    /// The prioritized attacker is checked first and wins outright on a touch;
    /// the other touch in the same pass is discarded.
    pub fn resolve_exchange(
        rules: &DuelRules,
        players: &[Option<Player>; 2],
        last_input: &[u64; 2],
        now: u64,
    ) -> Option<Slot> {
        let [Some(_), Some(_)] = players else {
            return None;
        };

        Self::priority_order(last_input).into_iter().find(|&slot| {
            match (&players[slot.index()], &players[slot.opponent().index()]) {
                (Some(attacker), Some(defender)) => Self::lands_hit(rules, attacker, defender, now),
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fencer(slot: Slot, x: f32, facing_right: bool, attack_started_at: Option<u64>) -> Player {
        Player {
            slot,
            nickname: slot.to_string(),
            x,
            y: 300.0,
            facing_right,
            attack_started_at,
        }
    }

    #[test]
    fn blade_rises_then_falls_across_window() {
        let rules = DuelRules::default();
        let window = rules.attack_window_ms;

        assert_eq!(CombatSystem::blade_offset(&rules, 0), 0.0);
        assert_eq!(CombatSystem::blade_offset(&rules, window / 2), rules.max_extend);
        assert_eq!(CombatSystem::blade_offset(&rules, window), 0.0);
        assert!(
            (CombatSystem::blade_offset(&rules, window / 4) - rules.max_extend / 2.0).abs() < 1e-4
        );
        assert!(
            (CombatSystem::blade_offset(&rules, window * 3 / 4) - rules.max_extend / 2.0).abs()
                < 1e-4
        );
        // Past the window the offset is clamped
        assert_eq!(CombatSystem::blade_offset(&rules, window * 10), 0.0);
    }

    #[test]
    fn tip_extends_in_facing_direction() {
        let rules = DuelRules::default();
        let right = CombatSystem::tip_x(&rules, 100.0, true, 0);
        let left = CombatSystem::tip_x(&rules, 100.0, false, 0);

        assert_eq!(right, 100.0 + rules.base_reach);
        assert_eq!(left, 100.0 - rules.base_reach);
    }

    #[test]
    fn attacking_holds_for_whole_window_only() {
        let rules = DuelRules::default();
        let start = 1_000;

        assert!(!CombatSystem::is_attacking(&rules, None, start));
        assert!(CombatSystem::is_attacking(&rules, Some(start), start));
        assert!(CombatSystem::is_attacking(
            &rules,
            Some(start),
            start + rules.attack_window_ms
        ));
        assert!(!CombatSystem::is_attacking(
            &rules,
            Some(start),
            start + rules.attack_window_ms + 1
        ));
    }

    #[test]
    fn touch_requires_tip_and_height_within_tolerance() {
        let rules = DuelRules::default();
        let attacker = fencer(Slot::P1, 100.0, true, Some(0));
        let mut defender = fencer(Slot::P2, 100.0 + rules.base_reach, false, None);

        assert!(CombatSystem::lands_hit(&rules, &attacker, &defender, 0));

        defender.y += rules.y_tolerance;
        assert!(!CombatSystem::lands_hit(&rules, &attacker, &defender, 0));

        defender.y = attacker.y;
        defender.x = 100.0 + rules.base_reach + rules.x_tolerance;
        assert!(!CombatSystem::lands_hit(&rules, &attacker, &defender, 0));
    }

    #[test]
    fn facing_away_never_touches() {
        let rules = DuelRules::default();
        let attacker = fencer(Slot::P1, 100.0, false, Some(0));
        let defender = fencer(Slot::P2, 100.0 + rules.base_reach, false, None);

        assert!(!CombatSystem::lands_hit(&rules, &attacker, &defender, 0));
    }

    #[test]
    fn idle_fencer_cannot_touch() {
        let rules = DuelRules::default();
        let attacker = fencer(Slot::P1, 100.0, true, None);
        let defender = fencer(Slot::P2, 100.0 + rules.base_reach, false, None);

        assert!(!CombatSystem::lands_hit(&rules, &attacker, &defender, 0));
    }

    #[test]
    fn most_recent_input_wins_double_touch() {
        let rules = DuelRules::default();
        let players = [
            Some(fencer(Slot::P1, 100.0, true, Some(0))),
            Some(fencer(Slot::P2, 160.0, false, Some(5))),
        ];

        assert_eq!(
            CombatSystem::resolve_exchange(&rules, &players, &[0, 5], 50),
            Some(Slot::P2)
        );
        assert_eq!(
            CombatSystem::resolve_exchange(&rules, &players, &[9, 5], 50),
            Some(Slot::P1)
        );
        // Tie goes to P1
        assert_eq!(
            CombatSystem::resolve_exchange(&rules, &players, &[5, 5], 50),
            Some(Slot::P1)
        );
    }

    #[test]
    fn lone_fencer_never_scores() {
        let rules = DuelRules::default();
        let players = [Some(fencer(Slot::P1, 100.0, true, Some(0))), None];

        assert_eq!(
            CombatSystem::resolve_exchange(&rules, &players, &[0, 0], 10),
            None
        );
    }
}
