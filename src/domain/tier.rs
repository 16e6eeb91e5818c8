//! Member role tiers
//!
//! Tiers form a fixed total order used by every content-gating check:
//! `Student < Premium < Vip < Admin`.

use serde::{Deserialize, Serialize};

/// Ordered role classification gating content visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Student,
    Premium,
    Vip,
    Admin,
}

impl Tier {
    /// Get the string ID for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Premium => "premium",
            Self::Vip => "vip",
            Self::Admin => "admin",
        }
    }

    /// Parse from database string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "premium" => Some(Self::Premium),
            "vip" => Some(Self::Vip),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Premium => "Premium",
            Self::Vip => "VIP",
            Self::Admin => "Admin",
        }
    }

    /// Whether this tier is paid for via a plan (and can therefore expire)
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Premium | Self::Vip)
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::Student
    }
}
