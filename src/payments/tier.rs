//! Tier calculator
//!
//! A member's tier is a pure function of their approved-payment history.
//! The approval engine recomputes it once per approval, but the same
//! function is safe to re-run at any time as a reconciliation tool.

use std::env;

use strum::{Display, EnumString};

/// Tier label derived from approved payments. Display/recognition only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Tier {
    #[strum(serialize = "BASIC")]
    Basic,
    #[strum(serialize = "PRO")]
    Pro,
    #[strum(serialize = "ELITE")]
    Elite,
}

impl Tier {
    /// Human-facing label used in member notifications.
    pub fn label(self) -> &'static str {
        match self {
            Tier::Basic => "Basic",
            Tier::Pro => "Pro",
            Tier::Elite => "Elite",
        }
    }
}

/// A member's approved-payment history, as the calculator sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ApprovedHistory {
    pub count: u32,
    pub total: f64,
}

/// Tier thresholds. Configuration, not business logic baked into the
/// state machine: counts are required, sum thresholds are optional
/// extra gates.
#[derive(Debug, Clone, PartialEq)]
pub struct TierThresholds {
    pub pro_count: u32,
    pub elite_count: u32,
    pub pro_total: Option<f64>,
    pub elite_total: Option<f64>,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            pro_count: 5,
            elite_count: 12,
            pro_total: None,
            elite_total: None,
        }
    }
}

impl TierThresholds {
    /// Read threshold overrides from the environment, falling back to the
    /// defaults (Pro at 5 approved payments, Elite at 12).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pro_count: env_u32("TIER_PRO_COUNT").unwrap_or(defaults.pro_count),
            elite_count: env_u32("TIER_ELITE_COUNT").unwrap_or(defaults.elite_count),
            pro_total: env_f64("TIER_PRO_TOTAL"),
            elite_total: env_f64("TIER_ELITE_TOTAL"),
        }
    }
}

fn env_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Compute the tier for a given approved history. Deterministic and
/// side-effect free.
pub fn tier_for(history: ApprovedHistory, thresholds: &TierThresholds) -> Tier {
    let meets = |count: u32, total: Option<f64>| {
        history.count >= count && total.is_none_or(|min| history.total > min)
    };

    if meets(thresholds.elite_count, thresholds.elite_total) {
        Tier::Elite
    } else if meets(thresholds.pro_count, thresholds.pro_total) {
        Tier::Pro
    } else {
        Tier::Basic
    }
}
