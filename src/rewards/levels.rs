//! Level thresholds
//!
//! Pure mapping from accumulated XP to a level. The table is a fixed,
//! pre-sorted list of (floor, level) pairs; there is no shared mutable state.
//!
//! XP below the first floor is level 0 — an explicit unleveled state. A user
//! at 0 XP and a user at 999 XP are both level 0, and no badge mint is ever
//! issued for level 0.

/// Ascending (xp floor, level) pairs. Brackets widen at higher tiers.
const LEVEL_FLOORS: &[(i64, u32)] = &[
    (1_000, 1),
    (3_000, 2),
    (5_000, 3),
    (8_000, 4),
    (12_000, 5),
    (17_000, 6),
    (23_000, 7),
    (30_000, 8),
    (40_000, 9),
    (50_000, 10),
];

/// Highest attainable level
pub const MAX_LEVEL: u32 = 10;

/// Level for an XP total. Monotonically non-decreasing in xp.
pub fn level_for(xp: i64) -> u32 {
    let mut level = 0;
    for (floor, l) in LEVEL_FLOORS {
        if xp >= *floor {
            level = *l;
        } else {
            break;
        }
    }
    level
}

/// XP floor of a level, if the level exists
pub fn floor_of(level: u32) -> Option<i64> {
    LEVEL_FLOORS
        .iter()
        .find(|(_, l)| *l == level)
        .map(|(floor, _)| *floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_threshold_is_level_zero() {
        assert_eq!(level_for(0), 0);
        assert_eq!(level_for(500), 0);
        assert_eq!(level_for(999), 0);
    }

    #[test]
    fn test_bracket_boundaries() {
        assert_eq!(level_for(1_000), 1);
        assert_eq!(level_for(1_200), 1);
        assert_eq!(level_for(2_999), 1);
        assert_eq!(level_for(3_000), 2);
        assert_eq!(level_for(49_999), 9);
        assert_eq!(level_for(50_000), 10);
        assert_eq!(level_for(1_000_000), 10);
    }

    #[test]
    fn test_monotone_non_decreasing() {
        let mut prev = 0;
        for xp in (0..60_000).step_by(250) {
            let level = level_for(xp);
            assert!(level >= prev, "level dropped at xp={}", xp);
            prev = level;
        }
    }

    #[test]
    fn test_idempotent() {
        for xp in [0, 999, 1_000, 12_345, 50_000] {
            assert_eq!(level_for(xp), level_for(xp));
        }
    }

    #[test]
    fn test_floor_of_matches_table() {
        assert_eq!(floor_of(1), Some(1_000));
        assert_eq!(floor_of(10), Some(50_000));
        assert_eq!(floor_of(0), None);
        assert_eq!(floor_of(11), None);
    }
}
