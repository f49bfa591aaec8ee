//! Political Stability Index → risk tier classification.
//!
//! Tiers partition `[0, 100]` with fixed inclusive lower bounds. A score that
//! sits exactly on a bound belongs to the more severe tier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PSI_MIN: f64 = 0.0;
pub const PSI_MAX: f64 = 100.0;

/// Ordered from calmest to most severe; `Ord` follows severity.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RiskTier {
    Stable,
    Moderate,
    Elevated,
    High,
    Crisis,
}

/// Inclusive lower bound of every tier above `Stable`, ascending.
const TIER_THRESHOLDS: [(f64, RiskTier); 4] = [
    (31.0, RiskTier::Moderate),
    (51.0, RiskTier::Elevated),
    (71.0, RiskTier::High),
    (86.0, RiskTier::Crisis),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown risk level `{0}`")]
pub struct UnknownRiskLevel(pub String);

impl RiskTier {
    pub const ALL: [RiskTier; 5] = [
        RiskTier::Stable,
        RiskTier::Moderate,
        RiskTier::Elevated,
        RiskTier::High,
        RiskTier::Crisis,
    ];

    /// Total and monotonic over all `f64`: below-range and NaN scores are
    /// `Stable`, above-range scores are `Crisis`.
    pub fn classify(psi_score: f64) -> RiskTier {
        let mut tier = RiskTier::Stable;
        for (lower, candidate) in TIER_THRESHOLDS {
            if psi_score >= lower {
                tier = candidate;
            }
        }
        tier
    }

    /// 0 for `Stable` through 4 for `Crisis`.
    pub fn severity(self) -> u8 {
        self as u8
    }

    pub fn lower_bound(self) -> f64 {
        TIER_THRESHOLDS
            .iter()
            .find(|(_, t)| *t == self)
            .map(|(lower, _)| *lower)
            .unwrap_or(PSI_MIN)
    }

    pub fn is_most_severe(self) -> bool {
        self == RiskTier::Crisis
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Stable => "Stable",
            RiskTier::Moderate => "Moderate",
            RiskTier::Elevated => "Elevated",
            RiskTier::High => "High",
            RiskTier::Crisis => "Crisis",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = UnknownRiskLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        RiskTier::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownRiskLevel(s.to_string()))
    }
}

/// Whether `score` is a usable PSI value.
pub fn is_valid_psi(score: f64) -> bool {
    score.is_finite() && (PSI_MIN..=PSI_MAX).contains(&score)
}

#[cfg(test)]
mod tests {
    use super::{RiskTier, is_valid_psi};

    #[test]
    fn boundaries_belong_to_the_higher_tier() {
        assert_eq!(RiskTier::classify(0.0), RiskTier::Stable);
        assert_eq!(RiskTier::classify(30.9), RiskTier::Stable);
        assert_eq!(RiskTier::classify(31.0), RiskTier::Moderate);
        assert_eq!(RiskTier::classify(50.99), RiskTier::Moderate);
        assert_eq!(RiskTier::classify(51.0), RiskTier::Elevated);
        assert_eq!(RiskTier::classify(71.0), RiskTier::High);
        assert_eq!(RiskTier::classify(85.9), RiskTier::High);
        assert_eq!(RiskTier::classify(86.0), RiskTier::Crisis);
        assert_eq!(RiskTier::classify(100.0), RiskTier::Crisis);
    }

    #[test]
    fn classification_is_monotonic() {
        let mut prev = RiskTier::classify(-1.0);
        let mut score = -1.0;
        while score <= 101.0 {
            let tier = RiskTier::classify(score);
            assert!(
                tier.severity() >= prev.severity(),
                "severity dropped at {score}: {prev} -> {tier}"
            );
            prev = tier;
            score += 0.05;
        }
    }

    #[test]
    fn out_of_range_scores_stay_total() {
        assert_eq!(RiskTier::classify(f64::NAN), RiskTier::Stable);
        assert_eq!(RiskTier::classify(-5.0), RiskTier::Stable);
        assert_eq!(RiskTier::classify(250.0), RiskTier::Crisis);
        assert!(!is_valid_psi(f64::NAN));
        assert!(!is_valid_psi(100.5));
        assert!(is_valid_psi(0.0));
    }

    #[test]
    fn lower_bounds_round_trip_through_classify() {
        for tier in RiskTier::ALL {
            assert_eq!(RiskTier::classify(tier.lower_bound()), tier);
        }
    }

    #[test]
    fn parses_server_strings() {
        assert_eq!("Crisis".parse::<RiskTier>(), Ok(RiskTier::Crisis));
        assert_eq!(" moderate ".parse::<RiskTier>(), Ok(RiskTier::Moderate));
        assert!("Severe".parse::<RiskTier>().is_err());
    }

    #[test]
    fn serde_uses_display_names() {
        let json = serde_json::to_string(&RiskTier::Elevated).unwrap();
        assert_eq!(json, "\"Elevated\"");
        let back: RiskTier = serde_json::from_str("\"High\"").unwrap();
        assert_eq!(back, RiskTier::High);
    }
}
