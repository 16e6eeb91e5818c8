//! Challenge progress tracking
//!
//! Pure transformations over [`ChallengeProgress`]. Completion pays out at
//! most once per period: once `completed` is set, further ticks are no-ops
//! until the scheduler rolls the period over.

use chrono::{DateTime, Utc};

use crate::domain::{Challenge, ChallengeProgress};

/// Reward owed for completing a challenge period
#[derive(Debug, Clone, PartialEq)]
pub struct RewardIntent {
    pub xp: u64,
    pub artifact_id: Option<String>,
}

/// Apply `amount` ticks to a challenge's progress.
///
/// The count is clamped at the challenge target. The first tick that
/// reaches the target sets `completed`, appends `true` to the history and
/// yields a [`RewardIntent`]; every later tick in the same period returns
/// no reward.
pub fn tick(
    progress: &ChallengeProgress,
    challenge: &Challenge,
    amount: u32,
    now: DateTime<Utc>,
) -> (ChallengeProgress, Option<RewardIntent>) {
    let mut next = progress.clone();

    if next.completed {
        // Idempotent within the period: at most one reward
        return (next, None);
    }

    next.current_count = next.current_count.saturating_add(amount).min(challenge.target_count);
    next.last_updated = now;

    if next.current_count == challenge.target_count {
        next.completed = true;
        next.history.push(true);
        let reward = RewardIntent {
            xp: challenge.reward_xp,
            artifact_id: challenge.reward_artifact.clone(),
        };
        return (next, Some(reward));
    }

    (next, None)
}

/// Close the current period.
///
/// Called once per day/week boundary by an external scheduler. A period
/// that closed without completion gets exactly one `false` history entry;
/// a completed period already logged its `true` at completion time. Either
/// way the count resets for the new period.
pub fn rollover_period(progress: &ChallengeProgress, now: DateTime<Utc>) -> ChallengeProgress {
    let mut next = progress.clone();
    if !next.completed {
        next.history.push(false);
    }
    next.current_count = 0;
    next.completed = false;
    next.last_updated = now;
    next
}
