//! Plan catalog: subscription tier to commission rate mapping.
//!
//! Pure data, no I/O. Commission rates are expressed in basis points so fee
//! math stays in integers end to end.

use serde::{Deserialize, Serialize};

/// A mentor's subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Starter,
    Pro,
    Scale,
}

impl PlanTier {
    /// Platform commission in basis points (1/100th of a percent).
    pub fn commission_bps(self) -> i64 {
        match self {
            Self::Starter => 1500,
            Self::Pro => 1000,
            Self::Scale => 700,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Scale => "scale",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "starter" => Some(Self::Starter),
            "pro" => Some(Self::Pro),
            "scale" => Some(Self::Scale),
            _ => None,
        }
    }

    /// Parse a stored tier, falling back to the highest-fee tier.
    ///
    /// An unknown or unset tier must never make the fee calculation
    /// silently zero, so the conservative default wins.
    pub fn from_str_lossy(s: &str) -> Self {
        Self::from_str(s).unwrap_or(Self::Starter)
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform fee for a sale of `amount_cents` under the given tier.
///
/// Half-up rounding of `amount * rate`, in minor units.
pub fn platform_fee_cents(amount_cents: i64, tier: PlanTier) -> i64 {
    (amount_cents * tier.commission_bps() + 5_000) / 10_000
}
