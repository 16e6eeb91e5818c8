//! Pure progression components: ladder, tracker, loot, entitlement, streaks
//!
//! Everything in this module is a synchronous pure transformation over
//! domain values. Nothing here touches storage or the clock; the
//! coordinator feeds in records and timestamps and persists the results.

pub mod entitlement;
pub mod ladder;
pub mod loot;
pub mod streaks;
pub mod tracker;

pub use entitlement::{EffectiveTier, can_access, can_post, resolve};
pub use ladder::{LevelLadder, LevelRequirement, LevelUp};
pub use loot::{
    DrawSource, LootResolver, MAX_BOX_DEPTH, OpenResult, SequenceDraw, SystemDraw, open_box,
    validate_acyclic, validate_table,
};
pub use streaks::{StreakInfo, day_string};
pub use tracker::{RewardIntent, rollover_period, tick};
