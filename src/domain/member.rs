//! The member record
//!
//! One record per member is the unit of consistency for the whole engine.
//! Only the coordinator mutates it, through versioned read-modify-write
//! transactions; every other component sees it as plain data.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::Artifact;
use super::challenge::ChallengeProgress;
use super::tier::Tier;
use crate::engine::streaks::StreakInfo;

/// Member identifier (UUID v4, stored as text)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(pub Uuid);

impl MemberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One inventory slot per distinct artifact, quantity never negative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub artifact_id: String,
    pub quantity: u32,
}

/// Per-member state consumed and produced by the progression engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub role: Tier,
    pub xp: u64,
    pub level: u32,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub is_banned: bool,
    pub muted_until: Option<DateTime<Utc>>,
    /// End of the active XP multiplier window, if any
    pub xp_boost_until: Option<DateTime<Utc>>,
    pub streak: StreakInfo,
    pub challenges: Vec<ChallengeProgress>,
    pub inventory: Vec<InventorySlot>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Fresh member at registration: zero XP, floor level, default role
    pub fn register(role: Tier, floor_level: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: MemberId::new(),
            role,
            xp: 0,
            level: floor_level,
            plan_expires_at: None,
            is_banned: false,
            muted_until: None,
            xp_boost_until: None,
            streak: StreakInfo::default(),
            challenges: Vec::new(),
            inventory: Vec::new(),
            created_at: now,
        }
    }

    /// Whether the XP multiplier window is active at `now`
    pub fn xp_boost_active(&self, now: DateTime<Utc>) -> bool {
        self.xp_boost_until.is_some_and(|until| until > now)
    }

    /// Find progress for a challenge, if any ticks have landed yet
    pub fn challenge_progress(&self, challenge_id: &str) -> Option<&ChallengeProgress> {
        self.challenges.iter().find(|p| p.challenge_id == challenge_id)
    }

    pub fn inventory_slot(&self, artifact_id: &str) -> Option<&InventorySlot> {
        self.inventory.iter().find(|s| s.artifact_id == artifact_id)
    }

    /// Add one unit of an artifact to the inventory, creating the slot on
    /// first ownership. Returns the new quantity.
    pub fn add_to_inventory(&mut self, artifact_id: &str) -> u32 {
        if let Some(slot) = self.inventory.iter_mut().find(|s| s.artifact_id == artifact_id) {
            slot.quantity += 1;
            slot.quantity
        } else {
            self.inventory.push(InventorySlot {
                artifact_id: artifact_id.to_string(),
                quantity: 1,
            });
            1
        }
    }

    /// Remove one unit of an artifact from the inventory.
    ///
    /// Consumable slots disappear at quantity 0; badge/ticket slots stay at
    /// quantity 0 as proof of past ownership. Returns false if the member
    /// does not own the artifact.
    pub fn remove_from_inventory(&mut self, artifact: &Artifact) -> bool {
        let Some(idx) = self.inventory.iter().position(|s| s.artifact_id == artifact.id) else {
            return false;
        };
        if self.inventory[idx].quantity == 0 {
            return false;
        }
        self.inventory[idx].quantity -= 1;
        if self.inventory[idx].quantity == 0 && artifact.is_consumable() {
            self.inventory.remove(idx);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::{ArtifactEffect, Rarity};

    fn badge() -> Artifact {
        Artifact {
            id: "badge_founder".to_string(),
            rarity: Rarity::Rare,
            effect: ArtifactEffect::None,
        }
    }

    fn booster() -> Artifact {
        Artifact {
            id: "booster_2x".to_string(),
            rarity: Rarity::Epic,
            effect: ArtifactEffect::XpBoost { duration_secs: 3600 },
        }
    }

    #[test]
    fn test_add_to_inventory_accumulates() {
        let mut member = Member::register(Tier::Student, 1, Utc::now());
        assert_eq!(member.add_to_inventory("badge_founder"), 1);
        assert_eq!(member.add_to_inventory("badge_founder"), 2);
        assert_eq!(member.inventory.len(), 1);
    }

    #[test]
    fn test_badge_slot_kept_at_zero_quantity() {
        let mut member = Member::register(Tier::Student, 1, Utc::now());
        member.add_to_inventory("badge_founder");
        assert!(member.remove_from_inventory(&badge()));
        // Slot stays as proof of ownership
        assert_eq!(member.inventory_slot("badge_founder").unwrap().quantity, 0);
        // But cannot go negative
        assert!(!member.remove_from_inventory(&badge()));
    }

    #[test]
    fn test_consumable_slot_removed_at_zero_quantity() {
        let mut member = Member::register(Tier::Student, 1, Utc::now());
        member.add_to_inventory("booster_2x");
        assert!(member.remove_from_inventory(&booster()));
        assert!(member.inventory_slot("booster_2x").is_none());
    }
}
