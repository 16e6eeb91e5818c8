//! Artifacts and loot tables
//!
//! An artifact is anything a member can own or be granted: badges, tickets,
//! XP boosters, nested loot boxes. Loot tables are ordered lists of
//! artifact/chance pairs consulted by the loot resolver.

use serde::{Deserialize, Serialize};

/// Artifact rarity band (display grouping, no mechanical weight)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "common" => Some(Self::Common),
            "rare" => Some(Self::Rare),
            "epic" => Some(Self::Epic),
            "legendary" => Some(Self::Legendary),
            _ => None,
        }
    }
}

/// What happens when an artifact drops
///
/// Exhaustively matched everywhere it is consumed; adding a variant is a
/// deliberate schema change, not an open-ended string dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactEffect {
    /// Extends the member's XP multiplier window by `duration_secs`
    XpBoost { duration_secs: i64 },
    /// Opens another loot table (nested boxes, depth-bounded)
    LootBox { table_id: String },
    /// No effect: the artifact lands in the inventory as-is
    None,
}

/// Artifact catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub rarity: Rarity,
    pub effect: ArtifactEffect,
}

impl Artifact {
    /// Effectful artifacts are consumed on drop and never sit in the
    /// inventory; badges and tickets (`None` effect) persist.
    pub fn is_consumable(&self) -> bool {
        !matches!(self.effect, ArtifactEffect::None)
    }
}

/// One entry of a loot table: an artifact and its drop chance in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootBoxItem {
    pub artifact_id: String,
    /// Drop chance in `[0, 100]`; the sum across a table may be below 100,
    /// the remainder is an implicit "no drop"
    pub drop_chance: f64,
}

/// Ordered loot table
///
/// Entry order is part of the configuration: the resolver walks entries
/// front to back, so earlier entries win ties at interval boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootTable {
    pub id: String,
    pub items: Vec<LootBoxItem>,
}

impl LootTable {
    /// Sum of all configured drop chances (may be below 100)
    pub fn total_chance(&self) -> f64 {
        self.items.iter().map(|i| i.drop_chance).sum()
    }
}
