//! SQLite connection and schema management for the progression store
//!
//! One row per member plus three global configuration tables (level ladder,
//! challenge catalog, loot tables), all versioned for optimistic-concurrency
//! writes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::engine::LevelLadder;

/// Database wrapper shared by the store facade
#[derive(Clone)]
pub struct ProgressionDb {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl ProgressionDb {
    /// Open or create the progression database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open progression db: {}", path.display()))?;

        // WAL for concurrent reader access alongside coordinator writes
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// In-memory database for tests and throwaway setups
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory db")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Get a reference to the connection (for queries)
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("Progression DB lock poisoned")
    }

    fn init_schema(&self) -> Result<()> {
        {
            let conn = self.conn();
            conn.execute_batch(SCHEMA_SQL)?;
        }
        self.seed_default_ladder()?;
        Ok(())
    }

    /// First boot only: install the default ladder so level resolution is
    /// total from the very first grant
    fn seed_default_ladder(&self) -> Result<()> {
        let conn = self.conn();
        let present: i64 =
            conn.query_row("SELECT COUNT(*) FROM level_ladder WHERE id = 1", [], |r| r.get(0))?;
        if present == 0 {
            let rows = serde_json::to_string(LevelLadder::default_table().rows())?;
            conn.execute(
                "INSERT INTO level_ladder (id, version, rows) VALUES (1, 1, ?1)",
                [&rows],
            )?;
        }
        Ok(())
    }
}

/// SQL schema for the progression database
const SCHEMA_SQL: &str = r#"
-- Member records (one row per member, the unit of consistency)
CREATE TABLE IF NOT EXISTS members (
    id TEXT PRIMARY KEY,
    version INTEGER NOT NULL DEFAULT 1,
    role TEXT NOT NULL,
    xp INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    plan_expires_at INTEGER,
    is_banned INTEGER NOT NULL DEFAULT 0,
    muted_until INTEGER,
    xp_boost_until INTEGER,
    streak_current INTEGER NOT NULL DEFAULT 0,
    streak_best INTEGER NOT NULL DEFAULT 0,
    streak_last_day TEXT,
    challenges TEXT NOT NULL DEFAULT '[]',
    inventory TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_members_role ON members(role);

-- Level ladder (singleton, replaced whole)
CREATE TABLE IF NOT EXISTS level_ladder (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL DEFAULT 1,
    rows TEXT NOT NULL
);

-- Challenge catalog
CREATE TABLE IF NOT EXISTS challenges (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    target_count INTEGER NOT NULL,
    reward_xp INTEGER NOT NULL,
    reward_artifact TEXT
);

-- Artifact catalog
CREATE TABLE IF NOT EXISTS artifacts (
    id TEXT PRIMARY KEY,
    rarity TEXT NOT NULL,
    effect TEXT NOT NULL
);

-- Loot tables (entry order is part of the configuration)
CREATE TABLE IF NOT EXISTS loot_tables (
    id TEXT PRIMARY KEY,
    version INTEGER NOT NULL DEFAULT 1,
    items TEXT NOT NULL
);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (1);
"#;
