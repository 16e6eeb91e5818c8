//! Daily activity streak tracking
//!
//! A streak counts consecutive calendar days with at least one XP-earning
//! event. Same-day events never double-count; a missed day resets the
//! count to 1 on the next activity.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Streak state persisted on the member record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreakInfo {
    pub current: u32,
    pub best: u32,
    /// Last counted day as YYYY-MM-DD (UTC)
    pub last_activity_day: Option<String>,
}

impl StreakInfo {
    /// Register activity for the day containing `now`.
    ///
    /// Returns the new streak count if the day extended (or restarted) the
    /// streak, or None when today was already counted.
    pub fn note_activity(&mut self, now: DateTime<Utc>) -> Option<u32> {
        let today = day_string(now);
        if self.last_activity_day.as_deref() == Some(today.as_str()) {
            return None; // Already counted
        }

        let continues = self
            .last_activity_day
            .as_deref()
            .and_then(parse_day)
            .is_some_and(|last| (now.date_naive() - last).num_days() == 1);

        self.current = if continues { self.current + 1 } else { 1 };
        self.best = self.best.max(self.current);
        self.last_activity_day = Some(today);
        Some(self.current)
    }

    /// Streak bonus XP: 2 per streak day, capped at 20
    pub fn bonus_xp(&self) -> u64 {
        (u64::from(self.current) * 2).min(20)
    }
}

/// Format a timestamp as its UTC day bucket (YYYY-MM-DD)
pub fn day_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
