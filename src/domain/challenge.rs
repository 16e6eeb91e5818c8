//! Challenge catalog entries and per-member progress
//!
//! A challenge definition is immutable once progress references it; edits
//! create a new id rather than change the semantics of an active challenge,
//! so past history stays interpretable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracking period of a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeKind {
    Daily,
    Weekly,
    Custom,
}

impl ChallengeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Challenge definition from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub kind: ChallengeKind,
    /// Number of ticks required to complete one period; always > 0
    pub target_count: u32,
    pub reward_xp: u64,
    pub reward_artifact: Option<String>,
}

/// Per-member progress on one challenge
///
/// `history` is an append-only log: exactly one entry per closed tracking
/// period, `true` for completed, `false` for missed. Past entries are never
/// rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeProgress {
    pub challenge_id: String,
    pub current_count: u32,
    pub completed: bool,
    pub last_updated: DateTime<Utc>,
    pub history: Vec<bool>,
}

impl ChallengeProgress {
    /// Fresh progress, created lazily on the first tick of a challenge
    pub fn start(challenge_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            challenge_id: challenge_id.to_string(),
            current_count: 0,
            completed: false,
            last_updated: now,
            history: Vec::new(),
        }
    }

    /// Iterate over the period-by-period audit trail, oldest first
    pub fn history_iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.history.iter().copied()
    }

    /// Number of periods this challenge was completed in
    pub fn periods_completed(&self) -> usize {
        self.history.iter().filter(|&&done| done).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_reporting() {
        let mut progress = ChallengeProgress::start("daily_lesson", Utc::now());
        progress.history = vec![true, false, true, true];

        assert_eq!(progress.periods_completed(), 3);
        let trail: Vec<bool> = progress.history_iter().collect();
        assert_eq!(trail, vec![true, false, true, true]);
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [ChallengeKind::Daily, ChallengeKind::Weekly, ChallengeKind::Custom] {
            assert_eq!(ChallengeKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ChallengeKind::from_str("monthly"), None);
    }
}
