//! Core domain types for the progression engine

mod artifact;
mod challenge;
mod member;
mod tier;

pub use artifact::{Artifact, ArtifactEffect, LootBoxItem, LootTable, Rarity};
pub use challenge::{Challenge, ChallengeKind, ChallengeProgress};
pub use member::{InventorySlot, Member, MemberId};
pub use tier::Tier;
