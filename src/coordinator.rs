//! Progression coordinator
//!
//! Single entry point for every progression event: XP grants, challenge
//! ticks, loot opens, moderation changes, configuration writes. Each event
//! is one atomic read-modify-write transaction scoped to exactly one member
//! record, serialized through optimistic versioned writes: read the current
//! version, apply the pure transformation, write-if-unchanged, retry on
//! conflict up to a bounded cap.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::domain::{
    Artifact, ArtifactEffect, Challenge, ChallengeKind, ChallengeProgress, InventorySlot,
    LootTable, Member, MemberId, Tier,
};
use crate::engine::{
    self, DrawSource, EffectiveTier, LevelLadder, LevelRequirement, LevelUp, LootResolver,
    OpenResult, RewardIntent,
};
use crate::error::EngineError;
use crate::store::{MemberRecord, ProgressionStore};

/// Multiplier applied to grants inside an active XP-boost window
const XP_BOOST_FACTOR: u64 = 2;

/// Default cap on optimistic write retries
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Result of an XP grant
#[derive(Debug, Clone)]
pub struct GrantOutcome {
    pub new_xp: u64,
    pub new_level: u32,
    pub new_title: String,
    /// One entry per crossed threshold, ascending
    pub level_ups: Vec<LevelUp>,
    /// XP actually credited after boost and streak bonus
    pub xp_gained: u64,
    pub streak_bonus: u64,
    pub boost_applied: bool,
    /// New streak count when this event extended the daily streak
    pub streak_extended: Option<u32>,
}

/// Result of a challenge tick
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub progress: ChallengeProgress,
    pub reward: Option<RewardIntent>,
    /// Level-ups caused by the reward XP, if the tick completed the period
    pub level_ups: Vec<LevelUp>,
}

/// Partial moderation update; absent fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct ModerationUpdate {
    pub banned: Option<bool>,
    /// `Some(None)` clears an existing mute
    pub muted_until: Option<Option<DateTime<Utc>>>,
}

/// Read-model snapshot for the console's member screens
#[derive(Debug, Clone)]
pub struct MemberSummary {
    pub id: MemberId,
    pub role: Tier,
    pub xp: u64,
    pub level: u32,
    pub title: String,
    pub next_level_xp: Option<u64>,
    pub streak_current: u32,
    pub streak_best: u32,
    pub entitlement: EffectiveTier,
    pub active_challenges: Vec<ChallengeProgress>,
    pub inventory: Vec<InventorySlot>,
}

/// Orchestrates the pure engine components over the store
pub struct ProgressionCoordinator {
    store: ProgressionStore,
    max_retries: u32,
    #[cfg(test)]
    conflict_hook: Option<Box<dyn Fn(u32) + Send + Sync>>,
}

impl ProgressionCoordinator {
    pub fn new(store: ProgressionStore) -> Self {
        Self::with_retry_cap(store, DEFAULT_MAX_RETRIES)
    }

    pub fn with_retry_cap(store: ProgressionStore, max_retries: u32) -> Self {
        Self {
            store,
            max_retries,
            #[cfg(test)]
            conflict_hook: None,
        }
    }

    pub fn store(&self) -> &ProgressionStore {
        &self.store
    }

    // ========================================
    // MEMBER EVENTS
    // ========================================

    /// Register a new member at zero XP and the ladder's floor level
    pub fn register_member(&self, role: Tier, now: DateTime<Utc>) -> Result<Member, EngineError> {
        let ladder = self.store.load_ladder()?;
        let member = Member::register(role, ladder.floor_level(), now);
        self.store.insert_member(&member)?;
        debug!(member = %member.id, role = role.as_str(), "member registered");
        Ok(member)
    }

    /// Grant XP for an external action (course completed, post liked, ...)
    pub fn grant_xp(
        &self,
        member_id: &MemberId,
        amount: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<GrantOutcome, EngineError> {
        let ladder = self.store.load_ladder()?;
        let outcome = self.commit(member_id, |member| {
            Ok(award_xp(member, &ladder, amount, now))
        })?;
        debug!(
            member = %member_id,
            amount,
            gained = outcome.xp_gained,
            reason,
            "xp granted"
        );
        Ok(outcome)
    }

    /// Advance a challenge by `amount` ticks.
    ///
    /// An unknown challenge id is an error, never silent zero progress.
    /// Completion pays the reward XP through the same award path as
    /// [`Self::grant_xp`] and stores any reward artifact in the inventory.
    pub fn tick_challenge(
        &self,
        member_id: &MemberId,
        challenge_id: &str,
        amount: u32,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, EngineError> {
        let challenge = self.store.challenge(challenge_id)?;
        let ladder = self.store.load_ladder()?;

        self.commit(member_id, |member| {
            let progress = member
                .challenge_progress(challenge_id)
                .cloned()
                .unwrap_or_else(|| ChallengeProgress::start(challenge_id, now));

            let (next, reward) = engine::tick(&progress, &challenge, amount, now);
            upsert_progress(member, next.clone());

            let mut level_ups = Vec::new();
            if let Some(intent) = &reward {
                let award = award_xp(member, &ladder, intent.xp, now);
                level_ups = award.level_ups;
                if let Some(artifact_id) = &intent.artifact_id {
                    member.add_to_inventory(artifact_id);
                }
                debug!(member = %member.id, challenge = challenge_id, "challenge completed");
            }

            Ok(TickOutcome { progress: next, reward, level_ups })
        })
    }

    /// Close the period for every tracked challenge of the given kind.
    ///
    /// Called by the external scheduler at day/week boundaries. Returns the
    /// rolled-over progress entries.
    pub fn rollover_challenges(
        &self,
        member_id: &MemberId,
        kind: ChallengeKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<ChallengeProgress>, EngineError> {
        let catalog = self.store.challenge_catalog()?;
        self.commit(member_id, |member| {
            let mut rolled = Vec::new();
            for progress in member.challenges.iter_mut() {
                let matches_kind = catalog
                    .iter()
                    .any(|c| c.id == progress.challenge_id && c.kind == kind);
                if matches_kind {
                    *progress = engine::rollover_period(progress, now);
                    rolled.push(progress.clone());
                }
            }
            Ok(rolled)
        })
    }

    /// Close the period for one specific challenge (custom cadences)
    pub fn rollover_challenge(
        &self,
        member_id: &MemberId,
        challenge_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ChallengeProgress, EngineError> {
        // Surfaces ChallengeNotFound for unknown ids before touching the member
        self.store.challenge(challenge_id)?;
        self.commit(member_id, |member| {
            let progress = member
                .challenge_progress(challenge_id)
                .cloned()
                .unwrap_or_else(|| ChallengeProgress::start(challenge_id, now));
            let rolled = engine::rollover_period(&progress, now);
            upsert_progress(member, rolled.clone());
            Ok(rolled)
        })
    }

    /// Open a loot box against a configured table
    pub fn open_loot_box(
        &self,
        member_id: &MemberId,
        table_id: &str,
        now: DateTime<Utc>,
        rng: &mut dyn DrawSource,
    ) -> Result<OpenResult, EngineError> {
        let tables = self.store.loot_tables_all()?;
        if !tables.contains_key(table_id) {
            return Err(EngineError::LootTableNotFound(table_id.to_string()));
        }
        let artifacts = self.store.artifacts_all()?;
        let resolver = LootResolver::new(&tables, &artifacts);

        let result = self.commit(member_id, |member| {
            resolver.open(member, table_id, now, rng)
        })?;
        debug!(member = %member_id, table = table_id, drop = ?result.artifact_id(), "loot box opened");
        Ok(result)
    }

    /// Apply the admin console's mute/ban controls
    pub fn set_moderation(
        &self,
        member_id: &MemberId,
        update: ModerationUpdate,
    ) -> Result<Member, EngineError> {
        let updated = self.commit(member_id, |member| {
            if let Some(banned) = update.banned {
                member.is_banned = banned;
            }
            if let Some(muted_until) = update.muted_until {
                member.muted_until = muted_until;
            }
            Ok(member.clone())
        })?;
        info!(
            member = %member_id,
            banned = updated.is_banned,
            muted = updated.muted_until.is_some(),
            "moderation updated"
        );
        Ok(updated)
    }

    // ========================================
    // READ SURFACE
    // ========================================

    /// The single source of truth for "what tier does this member
    /// effectively have right now"
    pub fn resolve_entitlement(
        &self,
        member_id: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<EffectiveTier, EngineError> {
        let MemberRecord { member, .. } = self.store.load_member(member_id)?;
        Ok(engine::resolve(&member, now))
    }

    /// Snapshot for the console's member screens
    pub fn member_summary(
        &self,
        member_id: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<MemberSummary, EngineError> {
        let ladder = self.store.load_ladder()?;
        let MemberRecord { member, .. } = self.store.load_member(member_id)?;
        Ok(MemberSummary {
            entitlement: engine::resolve(&member, now),
            title: ladder.title_for(member.level).to_string(),
            next_level_xp: ladder.next_threshold(member.level),
            id: member.id.clone(),
            role: member.role,
            xp: member.xp,
            level: member.level,
            streak_current: member.streak.current,
            streak_best: member.streak.best,
            active_challenges: member.challenges,
            inventory: member.inventory,
        })
    }

    pub fn challenge_catalog(&self) -> Result<Vec<Challenge>, EngineError> {
        self.store.challenge_catalog()
    }

    // ========================================
    // CONFIGURATION (admin-only, replace-whole-table)
    // ========================================

    /// Replace the level ladder atomically; invalid tables never reach
    /// storage
    pub fn replace_level_ladder(
        &self,
        rows: Vec<LevelRequirement>,
    ) -> Result<(), EngineError> {
        let ladder = LevelLadder::new(rows)?;
        self.store.replace_ladder(&ladder)?;
        info!(levels = ladder.rows().len(), "level ladder replaced");
        Ok(())
    }

    pub fn upsert_challenge(&self, challenge: &Challenge) -> Result<(), EngineError> {
        if challenge.target_count == 0 {
            return Err(EngineError::InvariantViolation(format!(
                "challenge '{}': target count must be positive",
                challenge.id
            )));
        }
        if let Some(artifact_id) = &challenge.reward_artifact {
            // Reward must reference a cataloged artifact
            self.store.artifact(artifact_id)?;
        }
        self.store.upsert_challenge(challenge)?;
        info!(challenge = challenge.id, "challenge upserted");
        Ok(())
    }

    pub fn upsert_artifact(&self, artifact: &Artifact) -> Result<(), EngineError> {
        if let ArtifactEffect::XpBoost { duration_secs } = &artifact.effect
            && *duration_secs <= 0
        {
            return Err(EngineError::InvariantViolation(format!(
                "artifact '{}': boost duration must be positive",
                artifact.id
            )));
        }
        self.store.upsert_artifact(artifact)?;

        // A nested-box artifact can close a cycle between existing tables
        if matches!(artifact.effect, ArtifactEffect::LootBox { .. }) {
            let tables = self.store.loot_tables_all()?;
            let artifacts = self.store.artifacts_all()?;
            engine::validate_acyclic(&tables, &artifacts)?;
        }
        info!(artifact = artifact.id, "artifact upserted");
        Ok(())
    }

    /// Validate and install a loot table. Chances are checked per entry and
    /// the whole table graph is checked for cycles before the write lands,
    /// so a draw can never discover a cycle lazily.
    pub fn upsert_loot_table(&self, table: &LootTable) -> Result<(), EngineError> {
        engine::validate_table(table)?;

        let artifacts = self.store.artifacts_all()?;
        for item in &table.items {
            if !artifacts.contains_key(&item.artifact_id) {
                return Err(EngineError::ArtifactNotFound(item.artifact_id.clone()));
            }
        }

        let mut tables = self.store.loot_tables_all()?;
        tables.insert(table.id.clone(), table.clone());
        engine::validate_acyclic(&tables, &artifacts)?;

        self.store.upsert_loot_table(table)?;
        info!(
            table = table.id,
            entries = table.items.len(),
            chance_sum = table.total_chance(),
            "loot table upserted"
        );
        Ok(())
    }

    // ========================================
    // TRANSACTION BOUNDARY
    // ========================================

    /// Optimistic read-modify-write loop for one member record.
    ///
    /// The transformation must be pure over the member: it is re-run from a
    /// fresh read on every conflict. Retries are bounded; exhaustion is
    /// surfaced so the caller can resubmit the event.
    fn commit<T>(
        &self,
        member_id: &MemberId,
        mut apply: impl FnMut(&mut Member) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let MemberRecord { mut member, version } = self.store.load_member(member_id)?;
            let outcome = apply(&mut member)?;

            #[cfg(test)]
            if let Some(hook) = &self.conflict_hook {
                hook(attempts);
            }

            if self.store.try_save_member(&member, version)? {
                return Ok(outcome);
            }
            if attempts > self.max_retries {
                warn!(member = %member_id, attempts, "optimistic retry cap exhausted");
                return Err(EngineError::ConcurrencyExhausted {
                    member: member_id.clone(),
                    attempts,
                });
            }
            debug!(member = %member_id, attempts, "write conflict, retrying");
        }
    }
}

/// Shared reward-application primitive: boost multiplier, streak bonus,
/// ladder re-resolution, level-up synthesis.
fn award_xp(
    member: &mut Member,
    ladder: &LevelLadder,
    amount: u64,
    now: DateTime<Utc>,
) -> GrantOutcome {
    let boost_applied = member.xp_boost_active(now);
    let base = if boost_applied { amount * XP_BOOST_FACTOR } else { amount };

    let streak_extended = member.streak.note_activity(now);
    let streak_bonus = if member.streak.current > 0 { member.streak.bonus_xp() } else { 0 };

    let gained = base + streak_bonus;
    let old_level = member.level;
    member.xp += gained;
    member.level = ladder.resolve_level(member.xp);

    GrantOutcome {
        new_xp: member.xp,
        new_level: member.level,
        new_title: ladder.title_for(member.level).to_string(),
        level_ups: ladder.level_up_delta(old_level, member.level),
        xp_gained: gained,
        streak_bonus,
        boost_applied,
        streak_extended,
    }
}

/// Replace or insert a member's progress entry for a challenge
fn upsert_progress(member: &mut Member, progress: ChallengeProgress) {
    if let Some(slot) = member
        .challenges
        .iter_mut()
        .find(|p| p.challenge_id == progress.challenge_id)
    {
        *slot = progress;
    } else {
        member.challenges.push(progress);
    }
}

/// Extend a mute by a duration from now (console convenience)
pub fn mute_for(duration: Duration, now: DateTime<Utc>) -> ModerationUpdate {
    ModerationUpdate {
        banned: None,
        muted_until: Some(Some(now + duration)),
    }
}
