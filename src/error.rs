//! Error taxonomy for the progression engine
//!
//! Unknown ids are always surfaced, never defaulted: treating a missing
//! challenge or loot table as "zero progress" would mask configuration bugs
//! as legitimate zero-reward outcomes.

use crate::domain::MemberId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("challenge not found: {0}")]
    ChallengeNotFound(String),

    #[error("loot table not found: {0}")]
    LootTableNotFound(String),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Rejected at configuration-write time, never accepted into storage
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Loot table configuration references itself, directly or through
    /// nested box artifacts
    #[error("loot table cycle involving '{0}'")]
    LootTableCycle(String),

    /// Optimistic retry cap hit; the caller may resubmit the event
    #[error("write conflict for member {member} not resolved after {attempts} attempts")]
    ConcurrencyExhausted { member: MemberId, attempts: u32 },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A stored JSON column failed to deserialize
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}
