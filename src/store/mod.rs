//! Persistence for member records and global configuration
//!
//! The store exposes exactly the read/write surface the coordinator needs:
//! versioned member load/save for optimistic concurrency, and whole-table
//! reads/replacements for the three configuration tables.

mod db;
mod records;

pub use db::ProgressionDb;
pub use records::MemberRecord;

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result as AnyResult;
use rusqlite::params;

use crate::domain::{Artifact, Challenge, ChallengeKind, LootTable, Member, MemberId, Rarity};
use crate::engine::{LevelLadder, LevelRequirement};
use crate::error::EngineError;
use records::{member_from_row, member_json_columns, ts_to_millis};

/// Store facade over the progression database
#[derive(Clone)]
pub struct ProgressionStore {
    db: ProgressionDb,
}

impl ProgressionStore {
    pub fn open(path: &Path) -> AnyResult<Self> {
        Ok(Self { db: ProgressionDb::open(path)? })
    }

    pub fn open_in_memory() -> AnyResult<Self> {
        Ok(Self { db: ProgressionDb::open_in_memory()? })
    }

    // ========================================
    // MEMBER RECORDS
    // ========================================

    /// Insert a freshly registered member at version 1
    pub fn insert_member(&self, member: &Member) -> Result<(), EngineError> {
        let (challenges, inventory) = member_json_columns(member)?;
        let conn = self.db.conn();
        conn.execute(
            r#"INSERT INTO members
               (id, version, role, xp, level, plan_expires_at, is_banned, muted_until,
                xp_boost_until, streak_current, streak_best, streak_last_day,
                challenges, inventory, created_at)
               VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            params![
                member.id.to_string(),
                member.role.as_str(),
                member.xp,
                member.level,
                ts_to_millis(member.plan_expires_at),
                member.is_banned as i64,
                ts_to_millis(member.muted_until),
                ts_to_millis(member.xp_boost_until),
                member.streak.current,
                member.streak.best,
                member.streak.last_activity_day,
                challenges,
                inventory,
                member.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Load a member together with its current storage version
    pub fn load_member(&self, id: &MemberId) -> Result<MemberRecord, EngineError> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT * FROM members WHERE id = ?1",
            [id.to_string()],
            member_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => EngineError::MemberNotFound(id.clone()),
            other => EngineError::Storage(other),
        })
    }

    /// Write-if-unchanged: commits the member only when the stored version
    /// still matches `expected_version`. Returns false on conflict.
    pub fn try_save_member(
        &self,
        member: &Member,
        expected_version: u64,
    ) -> Result<bool, EngineError> {
        let (challenges, inventory) = member_json_columns(member)?;
        let conn = self.db.conn();
        let changed = conn.execute(
            r#"UPDATE members SET
                version = version + 1,
                role = ?1, xp = ?2, level = ?3, plan_expires_at = ?4,
                is_banned = ?5, muted_until = ?6, xp_boost_until = ?7,
                streak_current = ?8, streak_best = ?9, streak_last_day = ?10,
                challenges = ?11, inventory = ?12
               WHERE id = ?13 AND version = ?14"#,
            params![
                member.role.as_str(),
                member.xp,
                member.level,
                ts_to_millis(member.plan_expires_at),
                member.is_banned as i64,
                ts_to_millis(member.muted_until),
                ts_to_millis(member.xp_boost_until),
                member.streak.current,
                member.streak.best,
                member.streak.last_activity_day,
                challenges,
                inventory,
                member.id.to_string(),
                expected_version,
            ],
        )?;
        Ok(changed == 1)
    }

    // ========================================
    // LEVEL LADDER
    // ========================================

    pub fn load_ladder(&self) -> Result<LevelLadder, EngineError> {
        let conn = self.db.conn();
        let rows_json: String =
            conn.query_row("SELECT rows FROM level_ladder WHERE id = 1", [], |r| r.get(0))?;
        let rows: Vec<LevelRequirement> = serde_json::from_str(&rows_json)
            .map_err(|e| EngineError::CorruptRecord(e.to_string()))?;
        LevelLadder::new(rows)
    }

    /// Replace the whole ladder atomically; callers validate first
    pub fn replace_ladder(&self, ladder: &LevelLadder) -> Result<(), EngineError> {
        let rows = serde_json::to_string(ladder.rows())
            .map_err(|e| EngineError::CorruptRecord(e.to_string()))?;
        let conn = self.db.conn();
        conn.execute(
            "UPDATE level_ladder SET version = version + 1, rows = ?1 WHERE id = 1",
            [&rows],
        )?;
        Ok(())
    }

    // ========================================
    // CHALLENGE CATALOG
    // ========================================

    pub fn challenge(&self, id: &str) -> Result<Challenge, EngineError> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT id, kind, target_count, reward_xp, reward_artifact FROM challenges WHERE id = ?1",
            [id],
            challenge_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => EngineError::ChallengeNotFound(id.to_string()),
            other => EngineError::Storage(other),
        })
    }

    pub fn upsert_challenge(&self, challenge: &Challenge) -> Result<(), EngineError> {
        let conn = self.db.conn();
        conn.execute(
            r#"INSERT OR REPLACE INTO challenges (id, kind, target_count, reward_xp, reward_artifact)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                challenge.id,
                challenge.kind.as_str(),
                challenge.target_count,
                challenge.reward_xp,
                challenge.reward_artifact,
            ],
        )?;
        Ok(())
    }

    pub fn challenge_catalog(&self) -> Result<Vec<Challenge>, EngineError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, kind, target_count, reward_xp, reward_artifact FROM challenges ORDER BY id",
        )?;
        let challenges = stmt
            .query_map([], challenge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(challenges)
    }

    // ========================================
    // ARTIFACTS & LOOT TABLES
    // ========================================

    pub fn artifact(&self, id: &str) -> Result<Artifact, EngineError> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT id, rarity, effect FROM artifacts WHERE id = ?1",
            [id],
            artifact_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => EngineError::ArtifactNotFound(id.to_string()),
            other => EngineError::Storage(other),
        })
    }

    pub fn upsert_artifact(&self, artifact: &Artifact) -> Result<(), EngineError> {
        let effect = serde_json::to_string(&artifact.effect)
            .map_err(|e| EngineError::CorruptRecord(e.to_string()))?;
        let conn = self.db.conn();
        conn.execute(
            "INSERT OR REPLACE INTO artifacts (id, rarity, effect) VALUES (?1, ?2, ?3)",
            params![artifact.id, artifact.rarity.as_str(), effect],
        )?;
        Ok(())
    }

    pub fn artifacts_all(&self) -> Result<HashMap<String, Artifact>, EngineError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT id, rarity, effect FROM artifacts")?;
        let artifacts = stmt
            .query_map([], artifact_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(artifacts.into_iter().map(|a| (a.id.clone(), a)).collect())
    }

    pub fn loot_table(&self, id: &str) -> Result<LootTable, EngineError> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT id, items FROM loot_tables WHERE id = ?1",
            [id],
            loot_table_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => EngineError::LootTableNotFound(id.to_string()),
            other => EngineError::Storage(other),
        })
    }

    pub fn upsert_loot_table(&self, table: &LootTable) -> Result<(), EngineError> {
        let items = serde_json::to_string(&table.items)
            .map_err(|e| EngineError::CorruptRecord(e.to_string()))?;
        let conn = self.db.conn();
        conn.execute(
            r#"INSERT INTO loot_tables (id, version, items) VALUES (?1, 1, ?2)
               ON CONFLICT(id) DO UPDATE SET version = version + 1, items = ?2"#,
            params![table.id, items],
        )?;
        Ok(())
    }

    pub fn loot_tables_all(&self) -> Result<HashMap<String, LootTable>, EngineError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT id, items FROM loot_tables")?;
        let tables = stmt
            .query_map([], loot_table_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tables.into_iter().map(|t| (t.id.clone(), t)).collect())
    }
}

fn challenge_from_row(row: &rusqlite::Row<'_>) -> Result<Challenge, rusqlite::Error> {
    let kind: String = row.get(1)?;
    Ok(Challenge {
        id: row.get(0)?,
        kind: ChallengeKind::from_str(&kind).ok_or_else(|| corrupt_column(1, &kind))?,
        target_count: row.get(2)?,
        reward_xp: row.get(3)?,
        reward_artifact: row.get(4)?,
    })
}

fn artifact_from_row(row: &rusqlite::Row<'_>) -> Result<Artifact, rusqlite::Error> {
    let rarity: String = row.get(1)?;
    let effect_json: String = row.get(2)?;
    Ok(Artifact {
        id: row.get(0)?,
        rarity: Rarity::from_str(&rarity).ok_or_else(|| corrupt_column(1, &rarity))?,
        effect: serde_json::from_str(&effect_json)
            .map_err(|e| corrupt_column(2, &e.to_string()))?,
    })
}

fn loot_table_from_row(row: &rusqlite::Row<'_>) -> Result<LootTable, rusqlite::Error> {
    let items_json: String = row.get(1)?;
    Ok(LootTable {
        id: row.get(0)?,
        items: serde_json::from_str(&items_json).map_err(|e| corrupt_column(1, &e.to_string()))?,
    })
}

fn corrupt_column(idx: usize, detail: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        detail.to_string().into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArtifactEffect, Tier};
    use chrono::Utc;

    fn store() -> ProgressionStore {
        ProgressionStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_member_roundtrip() {
        let store = store();
        let member = Member::register(Tier::Premium, 1, Utc::now());
        store.insert_member(&member).unwrap();

        let record = store.load_member(&member.id).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.member.role, Tier::Premium);
        assert_eq!(record.member.xp, 0);
    }

    #[test]
    fn test_load_unknown_member() {
        let err = store().load_member(&MemberId::new()).unwrap_err();
        assert!(matches!(err, EngineError::MemberNotFound(_)));
    }

    #[test]
    fn test_versioned_save_detects_conflict() {
        let store = store();
        let mut member = Member::register(Tier::Student, 1, Utc::now());
        store.insert_member(&member).unwrap();

        member.xp = 50;
        assert!(store.try_save_member(&member, 1).unwrap());

        // Stale version: the row moved to version 2 under us
        member.xp = 70;
        assert!(!store.try_save_member(&member, 1).unwrap());
        assert!(store.try_save_member(&member, 2).unwrap());

        let record = store.load_member(&member.id).unwrap();
        assert_eq!(record.member.xp, 70);
        assert_eq!(record.version, 3);
    }

    #[test]
    fn test_ladder_replace_bumps_version() {
        let store = store();
        let ladder = store.load_ladder().unwrap();
        assert_eq!(ladder.floor_level(), 1);

        store.replace_ladder(&ladder).unwrap();
        let conn = store.db.conn();
        let version: i64 = conn
            .query_row("SELECT version FROM level_ladder WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_challenge_catalog_roundtrip() {
        let store = store();
        let challenge = Challenge {
            id: "weekly_quiz".to_string(),
            kind: ChallengeKind::Weekly,
            target_count: 5,
            reward_xp: 100,
            reward_artifact: Some("badge_quiz".to_string()),
        };
        store.upsert_challenge(&challenge).unwrap();

        assert_eq!(store.challenge("weekly_quiz").unwrap(), challenge);
        assert!(matches!(
            store.challenge("missing").unwrap_err(),
            EngineError::ChallengeNotFound(_)
        ));
        assert_eq!(store.challenge_catalog().unwrap().len(), 1);
    }

    #[test]
    fn test_artifact_and_table_roundtrip() {
        let store = store();
        let artifact = Artifact {
            id: "booster".to_string(),
            rarity: Rarity::Epic,
            effect: ArtifactEffect::XpBoost { duration_secs: 1800 },
        };
        store.upsert_artifact(&artifact).unwrap();
        assert_eq!(store.artifact("booster").unwrap(), artifact);

        let table = LootTable {
            id: "starter".to_string(),
            items: vec![crate::domain::LootBoxItem {
                artifact_id: "booster".to_string(),
                drop_chance: 25.0,
            }],
        };
        store.upsert_loot_table(&table).unwrap();
        assert_eq!(store.loot_table("starter").unwrap(), table);
        assert_eq!(store.loot_tables_all().unwrap().len(), 1);
    }
}
