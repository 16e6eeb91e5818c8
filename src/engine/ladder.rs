//! XP and level ladder
//!
//! The ladder is an immutable configuration snapshot: an ascending table of
//! XP thresholds with titles. Level resolution is a total function of XP,
//! so it can never fail once a valid table is in place.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One row of the level ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRequirement {
    pub level: u32,
    pub xp_required: u64,
    pub title: String,
}

/// A level-up notification, one per crossed threshold
#[derive(Debug, Clone, PartialEq)]
pub struct LevelUp {
    pub level: u32,
    pub title: String,
}

/// Validated, ascending level table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelLadder {
    rows: Vec<LevelRequirement>,
}

impl LevelLadder {
    /// Build a ladder, rejecting tables that violate the ladder invariants:
    /// non-empty, strictly increasing XP thresholds, contiguous levels
    /// starting at the configured floor.
    pub fn new(rows: Vec<LevelRequirement>) -> Result<Self, EngineError> {
        if rows.is_empty() {
            return Err(EngineError::InvariantViolation(
                "level ladder must have at least one row".to_string(),
            ));
        }
        for pair in rows.windows(2) {
            if pair[1].xp_required <= pair[0].xp_required {
                return Err(EngineError::InvariantViolation(format!(
                    "level ladder XP thresholds must be strictly increasing ({} -> {})",
                    pair[0].xp_required, pair[1].xp_required
                )));
            }
            if pair[1].level != pair[0].level + 1 {
                return Err(EngineError::InvariantViolation(format!(
                    "level ladder levels must be contiguous ({} -> {})",
                    pair[0].level, pair[1].level
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Default 10-level ladder seeded on first database init
    pub fn default_table() -> &'static Self {
        static DEFAULT: Lazy<LevelLadder> = Lazy::new(build_default_table);
        &DEFAULT
    }

    /// Lowest level in the table (levels for brand-new members)
    pub fn floor_level(&self) -> u32 {
        self.rows[0].level
    }

    pub fn rows(&self) -> &[LevelRequirement] {
        &self.rows
    }

    /// Highest level whose threshold is at or below `xp`.
    ///
    /// Total: XP below the first threshold resolves to the floor level.
    pub fn resolve_level(&self, xp: u64) -> u32 {
        self.rows
            .iter()
            .rev()
            .find(|r| xp >= r.xp_required)
            .map(|r| r.level)
            .unwrap_or_else(|| self.floor_level())
    }

    /// Title for a level (floor title if the level is off-table)
    pub fn title_for(&self, level: u32) -> &str {
        self.rows
            .iter()
            .find(|r| r.level == level)
            .map(|r| r.title.as_str())
            .unwrap_or(self.rows[0].title.as_str())
    }

    /// XP threshold of the next level, None at the top of the ladder
    pub fn next_threshold(&self, level: u32) -> Option<u64> {
        self.rows.iter().find(|r| r.level == level + 1).map(|r| r.xp_required)
    }

    /// One notification per crossed threshold, in ascending order, so a
    /// grant that jumps three levels reads "Level 4! Level 5! Level 6!"
    /// rather than a single jump.
    pub fn level_up_delta(&self, old_level: u32, new_level: u32) -> Vec<LevelUp> {
        self.rows
            .iter()
            .filter(|r| r.level > old_level && r.level <= new_level)
            .map(|r| LevelUp {
                level: r.level,
                title: r.title.clone(),
            })
            .collect()
    }
}

fn build_default_table() -> LevelLadder {
    let rows = [
        (1, 0, "Newcomer"),
        (2, 100, "Explorer"),
        (3, 250, "Apprentice"),
        (4, 500, "Scholar"),
        (5, 900, "Scholar"),
        (6, 1500, "Adept"),
        (7, 2400, "Adept"),
        (8, 3600, "Mentor"),
        (9, 5200, "Mentor"),
        (10, 7500, "Luminary"),
    ]
    .into_iter()
    .map(|(level, xp_required, title)| LevelRequirement {
        level,
        xp_required,
        title: title.to_string(),
    })
    .collect();
    LevelLadder::new(rows).expect("default ladder is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> LevelLadder {
        LevelLadder::new(
            (1..=7)
                .map(|level| LevelRequirement {
                    level,
                    xp_required: ((level - 1) as u64) * 100,
                    title: format!("Title {level}"),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_level() {
        let ladder = ladder();
        assert_eq!(ladder.resolve_level(0), 1);
        assert_eq!(ladder.resolve_level(99), 1);
        assert_eq!(ladder.resolve_level(100), 2);
        assert_eq!(ladder.resolve_level(600), 7);
        assert_eq!(ladder.resolve_level(100_000), 7); // Beyond max
    }

    #[test]
    fn test_resolve_level_monotonic() {
        let ladder = ladder();
        let mut last = 0;
        for xp in 0..800 {
            let level = ladder.resolve_level(xp);
            assert!(level >= last, "level dropped at xp={xp}");
            last = level;
        }
    }

    #[test]
    fn test_level_up_delta_crossing_three_levels() {
        let ladder = ladder();
        let ups = ladder.level_up_delta(3, 6);
        let levels: Vec<u32> = ups.iter().map(|u| u.level).collect();
        assert_eq!(levels, vec![4, 5, 6]);
    }

    #[test]
    fn test_level_up_delta_no_change() {
        assert!(ladder().level_up_delta(3, 3).is_empty());
    }

    #[test]
    fn test_rejects_non_increasing_thresholds() {
        let rows = vec![
            LevelRequirement { level: 1, xp_required: 0, title: "A".into() },
            LevelRequirement { level: 2, xp_required: 0, title: "B".into() },
        ];
        assert!(matches!(
            LevelLadder::new(rows),
            Err(EngineError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_rejects_level_gaps() {
        let rows = vec![
            LevelRequirement { level: 1, xp_required: 0, title: "A".into() },
            LevelRequirement { level: 3, xp_required: 100, title: "B".into() },
        ];
        assert!(matches!(
            LevelLadder::new(rows),
            Err(EngineError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_default_table_valid() {
        let ladder = LevelLadder::default_table();
        assert_eq!(ladder.floor_level(), 1);
        assert_eq!(ladder.resolve_level(7500), 10);
    }
}
