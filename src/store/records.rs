//! Row <-> domain mapping for member records
//!
//! Challenge progress and inventory live as JSON columns inside the member
//! row so the whole record commits (or conflicts) as one versioned unit.

use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::domain::{Member, MemberId, Tier};
use crate::engine::StreakInfo;
use crate::error::EngineError;

/// A member plus the storage version its in-memory copy was read at
#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub member: Member,
    pub version: u64,
}

pub(crate) fn member_from_row(row: &Row<'_>) -> Result<MemberRecord, rusqlite::Error> {
    let id: String = row.get("id")?;
    let version: u64 = row.get("version")?;
    let role: String = row.get("role")?;
    let challenges_json: String = row.get("challenges")?;
    let inventory_json: String = row.get("inventory")?;

    let member = Member {
        id: MemberId::parse(&id).ok_or_else(|| corrupt("id", &id))?,
        role: Tier::from_str(&role).ok_or_else(|| corrupt("role", &role))?,
        xp: row.get("xp")?,
        level: row.get("level")?,
        plan_expires_at: millis_to_ts(row.get("plan_expires_at")?),
        is_banned: row.get::<_, i64>("is_banned")? != 0,
        muted_until: millis_to_ts(row.get("muted_until")?),
        xp_boost_until: millis_to_ts(row.get("xp_boost_until")?),
        streak: StreakInfo {
            current: row.get("streak_current")?,
            best: row.get("streak_best")?,
            last_activity_day: row.get("streak_last_day")?,
        },
        challenges: serde_json::from_str(&challenges_json)
            .map_err(|e| corrupt("challenges", &e.to_string()))?,
        inventory: serde_json::from_str(&inventory_json)
            .map_err(|e| corrupt("inventory", &e.to_string()))?,
        created_at: millis_to_ts(row.get("created_at")?).unwrap_or_default(),
    };

    Ok(MemberRecord { member, version })
}

/// JSON-encode the list columns of a member for a write
pub(crate) fn member_json_columns(member: &Member) -> Result<(String, String), EngineError> {
    let challenges = serde_json::to_string(&member.challenges)
        .map_err(|e| EngineError::CorruptRecord(e.to_string()))?;
    let inventory = serde_json::to_string(&member.inventory)
        .map_err(|e| EngineError::CorruptRecord(e.to_string()))?;
    Ok((challenges, inventory))
}

pub(crate) fn ts_to_millis(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|t| t.timestamp_millis())
}

pub(crate) fn millis_to_ts(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

fn corrupt(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("corrupt {column}: {value}").into(),
    )
}
