//! Loot box resolution
//!
//! Draws walk the table in its configured order, so two value-equal tables
//! with different entry order are different configurations. Intervals are
//! lower-bound inclusive: for `[{A,30},{B,30}]` a draw of exactly 30 lands
//! on B. Any draw past the cumulative sum is "no drop".

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Artifact, ArtifactEffect, LootTable, Member};
use crate::error::EngineError;

/// Nested boxes deeper than this fail closed with a cycle error. Write-time
/// validation rejects cyclic configurations, this bound is the draw-time
/// backstop.
pub const MAX_BOX_DEPTH: u32 = 5;

/// Uniform source over `[0, 100)`
pub trait DrawSource {
    fn draw(&mut self) -> f64;
}

/// OS-entropy draw source used in production
#[derive(Debug, Default)]
pub struct SystemDraw;

impl DrawSource for SystemDraw {
    fn draw(&mut self) -> f64 {
        let mut buf = [0u8; 8];
        // Zero bytes on the (unreachable in practice) error path still give
        // a valid in-range draw
        let _ = getrandom::getrandom(&mut buf);
        let raw = u64::from_le_bytes(buf);
        (raw as f64 / (u64::MAX as f64 + 1.0)) * 100.0
    }
}

/// Scripted draw source for deterministic tests
#[derive(Debug)]
pub struct SequenceDraw {
    values: Vec<f64>,
    next: usize,
}

impl SequenceDraw {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self { values: values.into(), next: 0 }
    }
}

impl DrawSource for SequenceDraw {
    fn draw(&mut self) -> f64 {
        let v = self.values[self.next % self.values.len()];
        self.next += 1;
        v
    }
}

/// What a loot box open did to the member
#[derive(Debug, Clone, PartialEq)]
pub enum OpenResult {
    /// The draw fell past the cumulative sum
    NoDrop,
    /// A badge/ticket artifact landed in the inventory
    Stored { artifact_id: String, quantity: u32 },
    /// An XP booster dropped and extended the multiplier window
    BoostExtended { artifact_id: String, until: DateTime<Utc> },
}

impl OpenResult {
    pub fn artifact_id(&self) -> Option<&str> {
        match self {
            Self::NoDrop => None,
            Self::Stored { artifact_id, .. } | Self::BoostExtended { artifact_id, .. } => {
                Some(artifact_id)
            }
        }
    }
}

/// Single draw against one table: first cumulative interval containing the
/// roll wins, earlier entries win ties at interval boundaries.
pub fn open_box(table: &LootTable, rng: &mut dyn DrawSource) -> Option<String> {
    let roll = rng.draw();
    let mut upper = 0.0;
    for item in &table.items {
        upper += item.drop_chance;
        if roll < upper {
            return Some(item.artifact_id.clone());
        }
    }
    None
}

/// Resolves loot draws against the configured tables and artifact catalog
pub struct LootResolver<'a> {
    tables: &'a HashMap<String, LootTable>,
    artifacts: &'a HashMap<String, Artifact>,
}

impl<'a> LootResolver<'a> {
    pub fn new(
        tables: &'a HashMap<String, LootTable>,
        artifacts: &'a HashMap<String, Artifact>,
    ) -> Self {
        Self { tables, artifacts }
    }

    /// Open a box and apply whatever drops to the member record.
    ///
    /// Nested box artifacts recurse into their referenced table with a
    /// fresh draw, bounded by [`MAX_BOX_DEPTH`].
    pub fn open(
        &self,
        member: &mut Member,
        table_id: &str,
        now: DateTime<Utc>,
        rng: &mut dyn DrawSource,
    ) -> Result<OpenResult, EngineError> {
        self.open_at_depth(member, table_id, now, rng, 0)
    }

    fn open_at_depth(
        &self,
        member: &mut Member,
        table_id: &str,
        now: DateTime<Utc>,
        rng: &mut dyn DrawSource,
        depth: u32,
    ) -> Result<OpenResult, EngineError> {
        if depth >= MAX_BOX_DEPTH {
            return Err(EngineError::LootTableCycle(table_id.to_string()));
        }
        let table = self
            .tables
            .get(table_id)
            .ok_or_else(|| EngineError::LootTableNotFound(table_id.to_string()))?;

        let Some(artifact_id) = open_box(table, rng) else {
            return Ok(OpenResult::NoDrop);
        };
        let artifact = self
            .artifacts
            .get(&artifact_id)
            .ok_or_else(|| EngineError::ArtifactNotFound(artifact_id.clone()))?;

        match &artifact.effect {
            ArtifactEffect::XpBoost { duration_secs } => {
                let until = extend_boost(member.xp_boost_until, *duration_secs, now);
                member.xp_boost_until = Some(until);
                Ok(OpenResult::BoostExtended { artifact_id, until })
            }
            ArtifactEffect::LootBox { table_id: inner } => {
                self.open_at_depth(member, inner, now, rng, depth + 1)
            }
            ArtifactEffect::None => {
                let quantity = member.add_to_inventory(&artifact_id);
                Ok(OpenResult::Stored { artifact_id, quantity })
            }
        }
    }
}

/// Additive stacking: an active window is extended from its current end,
/// an expired or absent one restarts from `now`.
fn extend_boost(
    current: Option<DateTime<Utc>>,
    duration_secs: i64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let base = match current {
        Some(until) if until > now => until,
        _ => now,
    };
    base + Duration::seconds(duration_secs)
}

/// Per-entry invariants, checked at configuration-write time
pub fn validate_table(table: &LootTable) -> Result<(), EngineError> {
    for item in &table.items {
        if !item.drop_chance.is_finite() || item.drop_chance < 0.0 {
            return Err(EngineError::InvariantViolation(format!(
                "loot table '{}': entry '{}' has negative chance",
                table.id, item.artifact_id
            )));
        }
        if item.drop_chance > 100.0 {
            return Err(EngineError::InvariantViolation(format!(
                "loot table '{}': entry '{}' exceeds 100% chance",
                table.id, item.artifact_id
            )));
        }
    }
    Ok(())
}

/// Reject cyclic table references at write time rather than discovering
/// them lazily at draw time. Edges run table -> artifact (nested box
/// effect) -> table.
pub fn validate_acyclic(
    tables: &HashMap<String, LootTable>,
    artifacts: &HashMap<String, Artifact>,
) -> Result<(), EngineError> {
    for start in tables.keys() {
        let mut path: Vec<&str> = Vec::new();
        walk(start, tables, artifacts, &mut path)?;
    }
    Ok(())
}

fn walk<'a>(
    table_id: &'a str,
    tables: &'a HashMap<String, LootTable>,
    artifacts: &'a HashMap<String, Artifact>,
    path: &mut Vec<&'a str>,
) -> Result<(), EngineError> {
    if path.contains(&table_id) {
        return Err(EngineError::LootTableCycle(table_id.to_string()));
    }
    let Some(table) = tables.get(table_id) else {
        // Dangling reference is caught by entry validation at upsert
        return Ok(());
    };
    path.push(table_id);
    for item in &table.items {
        if let Some(artifact) = artifacts.get(&item.artifact_id)
            && let ArtifactEffect::LootBox { table_id: inner } = &artifact.effect
        {
            walk(inner, tables, artifacts, path)?;
        }
    }
    path.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LootBoxItem, Rarity, Tier};

    fn table(id: &str, items: &[(&str, f64)]) -> LootTable {
        LootTable {
            id: id.to_string(),
            items: items
                .iter()
                .map(|(artifact_id, drop_chance)| LootBoxItem {
                    artifact_id: artifact_id.to_string(),
                    drop_chance: *drop_chance,
                })
                .collect(),
        }
    }

    fn badge(id: &str) -> Artifact {
        Artifact {
            id: id.to_string(),
            rarity: Rarity::Common,
            effect: ArtifactEffect::None,
        }
    }

    #[test]
    fn test_draw_intervals() {
        let t = table("t", &[("a", 30.0), ("b", 30.0), ("c", 20.0)]);
        let cases = [
            (0.0, Some("a")),
            (29.9, Some("a")),
            (30.0, Some("b")), // Boundary: lower-bound inclusive
            (59.9, Some("b")),
            (60.0, Some("c")),
            (79.9, Some("c")),
            (80.0, None),
            (99.9, None),
        ];
        for (roll, expect) in cases {
            let mut rng = SequenceDraw::new(vec![roll]);
            assert_eq!(open_box(&t, &mut rng).as_deref(), expect, "roll {roll}");
        }
    }

    #[test]
    fn test_open_stores_badge() {
        let tables = HashMap::from([("box".to_string(), table("box", &[("medal", 50.0)]))]);
        let artifacts = HashMap::from([("medal".to_string(), badge("medal"))]);
        let resolver = LootResolver::new(&tables, &artifacts);

        let mut member = Member::register(Tier::Student, 1, Utc::now());
        let mut rng = SequenceDraw::new(vec![10.0]);
        let result = resolver.open(&mut member, "box", Utc::now(), &mut rng).unwrap();
        assert_eq!(
            result,
            OpenResult::Stored { artifact_id: "medal".to_string(), quantity: 1 }
        );
    }

    #[test]
    fn test_boost_stacks_additively() {
        let now = Utc::now();
        let tables = HashMap::from([("box".to_string(), table("box", &[("boost", 100.0)]))]);
        let artifacts = HashMap::from([(
            "boost".to_string(),
            Artifact {
                id: "boost".to_string(),
                rarity: Rarity::Epic,
                effect: ArtifactEffect::XpBoost { duration_secs: 600 },
            },
        )]);
        let resolver = LootResolver::new(&tables, &artifacts);
        let mut member = Member::register(Tier::Student, 1, now);
        let mut rng = SequenceDraw::new(vec![0.0]);

        resolver.open(&mut member, "box", now, &mut rng).unwrap();
        assert_eq!(member.xp_boost_until, Some(now + Duration::seconds(600)));

        // Second drop extends from the current end, not from now
        resolver.open(&mut member, "box", now, &mut rng).unwrap();
        assert_eq!(member.xp_boost_until, Some(now + Duration::seconds(1200)));
    }

    #[test]
    fn test_nested_box_resolves_inner_table() {
        let tables = HashMap::from([
            ("outer".to_string(), table("outer", &[("inner_box", 100.0)])),
            ("inner".to_string(), table("inner", &[("medal", 100.0)])),
        ]);
        let artifacts = HashMap::from([
            (
                "inner_box".to_string(),
                Artifact {
                    id: "inner_box".to_string(),
                    rarity: Rarity::Rare,
                    effect: ArtifactEffect::LootBox { table_id: "inner".to_string() },
                },
            ),
            ("medal".to_string(), badge("medal")),
        ]);
        let resolver = LootResolver::new(&tables, &artifacts);
        let mut member = Member::register(Tier::Student, 1, Utc::now());
        let mut rng = SequenceDraw::new(vec![0.0]);

        let result = resolver.open(&mut member, "outer", Utc::now(), &mut rng).unwrap();
        assert_eq!(result.artifact_id(), Some("medal"));
    }

    #[test]
    fn test_self_referencing_box_fails_closed() {
        let tables = HashMap::from([("loop".to_string(), table("loop", &[("loop_box", 100.0)]))]);
        let artifacts = HashMap::from([(
            "loop_box".to_string(),
            Artifact {
                id: "loop_box".to_string(),
                rarity: Rarity::Rare,
                effect: ArtifactEffect::LootBox { table_id: "loop".to_string() },
            },
        )]);
        let resolver = LootResolver::new(&tables, &artifacts);
        let mut member = Member::register(Tier::Student, 1, Utc::now());
        let mut rng = SequenceDraw::new(vec![0.0]);

        let err = resolver.open(&mut member, "loop", Utc::now(), &mut rng).unwrap_err();
        assert!(matches!(err, EngineError::LootTableCycle(_)));
    }

    #[test]
    fn test_validate_acyclic_detects_cycle() {
        let tables = HashMap::from([
            ("a".to_string(), table("a", &[("to_b", 10.0)])),
            ("b".to_string(), table("b", &[("to_a", 10.0)])),
        ]);
        let artifacts = HashMap::from([
            (
                "to_b".to_string(),
                Artifact {
                    id: "to_b".to_string(),
                    rarity: Rarity::Rare,
                    effect: ArtifactEffect::LootBox { table_id: "b".to_string() },
                },
            ),
            (
                "to_a".to_string(),
                Artifact {
                    id: "to_a".to_string(),
                    rarity: Rarity::Rare,
                    effect: ArtifactEffect::LootBox { table_id: "a".to_string() },
                },
            ),
        ]);
        assert!(matches!(
            validate_acyclic(&tables, &artifacts),
            Err(EngineError::LootTableCycle(_))
        ));
    }

    #[test]
    fn test_validate_table_rejects_bad_chances() {
        assert!(validate_table(&table("t", &[("a", -1.0)])).is_err());
        assert!(validate_table(&table("t", &[("a", 101.0)])).is_err());
        assert!(validate_table(&table("t", &[("a", 100.0), ("b", 100.0)])).is_ok());
    }

    #[test]
    fn test_system_draw_in_range() {
        let mut rng = SystemDraw;
        for _ in 0..1000 {
            let v = rng.draw();
            assert!((0.0..100.0).contains(&v));
        }
    }
}
