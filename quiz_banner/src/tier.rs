//! Tier policy: question quotas and premium feature gates.
//!
//! The policy is a pure table lookup with no persistence. It is consulted
//! synchronously before every question insert.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Question quota for the free tier
pub const FREE_QUESTION_LIMIT: usize = 10;

/// Question quota for the premium tier
pub const PREMIUM_QUESTION_LIMIT: usize = 50;

/// Entitlement level of a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "premium" => Ok(Tier::Premium),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

/// Gated features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    BulkImport,
    CustomColors,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::BulkImport => write!(f, "bulk_import"),
            Feature::CustomColors => write!(f, "custom_colors"),
        }
    }
}

/// Limits and feature gates of a tier.
///
/// | Tier | Questions | Bulk import | Custom palettes |
/// |------|-----------|-------------|-----------------|
/// | Free | 10 | No | No |
/// | Premium | 50 | Yes | Yes |
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub tier: Tier,
    pub question_limit: usize,
    pub bulk_import: bool,
    pub custom_colors: bool,
}

impl TierLimits {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                tier,
                question_limit: FREE_QUESTION_LIMIT,
                bulk_import: false,
                custom_colors: false,
            },
            Tier::Premium => Self {
                tier,
                question_limit: PREMIUM_QUESTION_LIMIT,
                bulk_import: true,
                custom_colors: true,
            },
        }
    }

    pub fn allows(&self, feature: Feature) -> bool {
        match feature {
            Feature::BulkImport => self.bulk_import,
            Feature::CustomColors => self.custom_colors,
        }
    }
}

/// Question quota for a tier
pub fn limit_for(tier: Tier) -> usize {
    TierLimits::for_tier(tier).question_limit
}

/// Whether one more question fits under the quota
pub fn check_quota(current_count: usize, tier: Tier) -> bool {
    current_count < limit_for(tier)
}

/// Whether `additional` questions fit under the quota as one batch
pub fn check_batch_quota(current_count: usize, additional: usize, tier: Tier) -> bool {
    current_count.saturating_add(additional) <= limit_for(tier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn free_tier_allows_ten_questions() {
        assert_eq!(limit_for(Tier::Free), 10);
        assert!(check_quota(9, Tier::Free));
        assert!(!check_quota(10, Tier::Free));
    }

    #[test]
    fn premium_tier_allows_fifty_questions() {
        assert_eq!(limit_for(Tier::Premium), 50);
        assert!(check_quota(49, Tier::Premium));
        assert!(!check_quota(50, Tier::Premium));
    }

    #[test]
    fn bulk_import_is_premium_only() {
        assert!(!TierLimits::for_tier(Tier::Free).allows(Feature::BulkImport));
        assert!(TierLimits::for_tier(Tier::Premium).allows(Feature::BulkImport));
    }

    #[test]
    fn tier_parses_and_displays() {
        assert_eq!("premium".parse::<Tier>().unwrap(), Tier::Premium);
        assert_eq!(Tier::Free.to_string(), "free");
        assert!("gold".parse::<Tier>().is_err());
    }

    #[test]
    fn batch_quota_counts_the_whole_batch() {
        assert!(check_batch_quota(5, 5, Tier::Free));
        assert!(!check_batch_quota(5, 6, Tier::Free));
        assert!(check_batch_quota(0, 0, Tier::Free));
    }

    proptest! {
        #[test]
        fn quota_allows_exactly_below_limit(count in 0usize..200, premium in any::<bool>()) {
            let tier = if premium { Tier::Premium } else { Tier::Free };
            prop_assert_eq!(check_quota(count, tier), count < limit_for(tier));
        }

        #[test]
        fn single_insert_matches_batch_of_one(count in 0usize..200, premium in any::<bool>()) {
            let tier = if premium { Tier::Premium } else { Tier::Free };
            prop_assert_eq!(check_quota(count, tier), check_batch_quota(count, 1, tier));
        }
    }
}
