//! Entitlement resolution
//!
//! Not a stored state machine: the effective tier is re-derived from the
//! member record and the wall clock on every access check. Precedence is
//! fixed and total: Banned dominates everything, mute overlays the posting
//! axis on whatever tier survives plan expiry, expiry demotes a paid role
//! to Student without banning.

use chrono::{DateTime, Utc};

use crate::domain::{Member, Tier};

/// The tier actually granted right now, after ban/mute/expiry overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveTier {
    /// Fully blocked, including passive content viewing
    Banned,
    /// Keeps content access at `base` but cannot post until `until`
    Muted { base: Tier, until: DateTime<Utc> },
    /// Paid plan lapsed; demoted to the free tier
    Expired { fallback: Tier },
    Active { tier: Tier },
}

impl EffectiveTier {
    /// Tier used for content gating, None when even viewing is blocked
    pub fn content_tier(&self) -> Option<Tier> {
        match self {
            Self::Banned => None,
            Self::Muted { base, .. } => Some(*base),
            Self::Expired { fallback } => Some(*fallback),
            Self::Active { tier } => Some(*tier),
        }
    }
}

/// Classify a member's effective tier at `now`.
///
/// Expiry is evaluated before the mute overlay, so a muted member with a
/// lapsed plan carries the demoted tier: mute changes what they can post,
/// not what tier they read at.
pub fn resolve(member: &Member, now: DateTime<Utc>) -> EffectiveTier {
    if member.is_banned {
        return EffectiveTier::Banned;
    }

    let expired = member.role.is_paid()
        && member.plan_expires_at.is_some_and(|expires| expires <= now);
    let base = if expired { Tier::Student } else { member.role };

    if let Some(until) = member.muted_until
        && until > now
    {
        return EffectiveTier::Muted { base, until };
    }

    if expired {
        EffectiveTier::Expired { fallback: base }
    } else {
        EffectiveTier::Active { tier: base }
    }
}

/// Content gating against the fixed tier order. Banned fails everything;
/// Muted passes on the carried tier.
pub fn can_access(content_min: Tier, effective: EffectiveTier) -> bool {
    effective.content_tier().is_some_and(|tier| tier >= content_min)
}

/// Posting gating: only Banned and Muted lose the posting capability
pub fn can_post(effective: EffectiveTier) -> bool {
    matches!(
        effective,
        EffectiveTier::Active { .. } | EffectiveTier::Expired { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn member(role: Tier) -> Member {
        Member::register(role, 1, Utc::now())
    }

    #[test]
    fn test_banned_vip_with_active_plan_is_banned() {
        let now = Utc::now();
        let mut m = member(Tier::Vip);
        m.plan_expires_at = Some(now + Duration::days(30));
        m.is_banned = true;

        assert_eq!(resolve(&m, now), EffectiveTier::Banned);
        assert!(!can_access(Tier::Student, resolve(&m, now)));
        assert!(!can_post(resolve(&m, now)));
    }

    #[test]
    fn test_muted_vip_keeps_content_access_loses_posting() {
        let now = Utc::now();
        let mut m = member(Tier::Vip);
        let until = now + Duration::hours(2);
        m.muted_until = Some(until);

        let effective = resolve(&m, now);
        assert_eq!(effective, EffectiveTier::Muted { base: Tier::Vip, until });
        assert!(can_access(Tier::Vip, effective));
        assert!(!can_post(effective));
    }

    #[test]
    fn test_muted_premium_with_expired_plan_carries_student_base() {
        let now = Utc::now();
        let mut m = member(Tier::Premium);
        let until = now + Duration::hours(1);
        m.plan_expires_at = Some(now - Duration::days(1));
        m.muted_until = Some(until);

        assert_eq!(
            resolve(&m, now),
            EffectiveTier::Muted { base: Tier::Student, until }
        );
    }

    #[test]
    fn test_expired_premium_demotes_to_student() {
        let now = Utc::now();
        let mut m = member(Tier::Premium);
        m.plan_expires_at = Some(now - Duration::seconds(1));

        let effective = resolve(&m, now);
        assert_eq!(effective, EffectiveTier::Expired { fallback: Tier::Student });
        assert!(can_access(Tier::Student, effective));
        assert!(!can_access(Tier::Premium, effective));
        assert!(can_post(effective));
    }

    #[test]
    fn test_expiry_ignored_for_free_and_admin_roles() {
        let now = Utc::now();
        let mut m = member(Tier::Admin);
        m.plan_expires_at = Some(now - Duration::days(1));
        assert_eq!(resolve(&m, now), EffectiveTier::Active { tier: Tier::Admin });
    }

    #[test]
    fn test_elapsed_mute_is_inert() {
        let now = Utc::now();
        let mut m = member(Tier::Student);
        m.muted_until = Some(now - Duration::minutes(5));
        assert_eq!(resolve(&m, now), EffectiveTier::Active { tier: Tier::Student });
        assert!(can_post(resolve(&m, now)));
    }

    #[test]
    fn test_plan_expiring_exactly_now_counts_as_expired() {
        let now = Utc::now();
        let mut m = member(Tier::Vip);
        m.plan_expires_at = Some(now);
        assert_eq!(
            resolve(&m, now),
            EffectiveTier::Expired { fallback: Tier::Student }
        );
    }
}
