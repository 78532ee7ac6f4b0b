//! Hardware generation tiers
//!
//! Tiers are an ordered, closed set. Each tier has a [`TierFeatures`] row
//! describing which load qualifiers its instruction set provides; the selector
//! only ever consults that row, never the tier identity itself.
//!
//! The tier of the compiled target is [`TargetTier`], resolved from Cargo
//! features from most to least capable (`sm80`, `sm75`, `sm70`, then
//! [`Baseline`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::diagnostics::ParsePolicyError;
use crate::policy::PrefetchDistance;

/// Instruction-set generation, ordered by feature availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareTier {
    /// Any device below the first generation with cache qualifiers
    Baseline,
    /// Volta: L1 eviction priorities, non-coherent loads
    Sm70,
    /// Turing: adds L2 prefetch up to 128 bytes
    Sm75,
    /// Ampere and later: L2 prefetch up to 256 bytes
    Sm80,
}

impl HardwareTier {
    /// Most capable first, the order the dispatch chain checks them in
    pub const DESCENDING: [HardwareTier; 4] = [
        HardwareTier::Sm80,
        HardwareTier::Sm75,
        HardwareTier::Sm70,
        HardwareTier::Baseline,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            HardwareTier::Baseline => "baseline",
            HardwareTier::Sm70 => "sm70",
            HardwareTier::Sm75 => "sm75",
            HardwareTier::Sm80 => "sm80",
        }
    }

    /// Built-in feature row for this tier
    pub const fn features(self) -> TierFeatures {
        match self {
            HardwareTier::Baseline => TierFeatures::NONE,
            HardwareTier::Sm70 => TierFeatures {
                eviction_hints: true,
                non_coherent: true,
                max_prefetch: PrefetchDistance::None,
            },
            HardwareTier::Sm75 => TierFeatures {
                eviction_hints: true,
                non_coherent: true,
                max_prefetch: PrefetchDistance::B128,
            },
            HardwareTier::Sm80 => TierFeatures {
                eviction_hints: true,
                non_coherent: true,
                max_prefetch: PrefetchDistance::B256,
            },
        }
    }
}

impl fmt::Display for HardwareTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HardwareTier {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "");
        HardwareTier::DESCENDING
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| ParsePolicyError {
                kind: "hardware tier",
                value: s.to_string(),
                expected: "sm80, sm75, sm70, baseline".to_string(),
            })
    }
}

/// Qualifier availability of one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierFeatures {
    /// `L1::evict_*` / `L1::no_allocate` qualifiers
    pub eviction_hints: bool,
    /// `.nc` read-only load family
    pub non_coherent: bool,
    /// Widest `L2::<N>B` prefetch qualifier
    pub max_prefetch: PrefetchDistance,
}

impl TierFeatures {
    pub const NONE: TierFeatures = TierFeatures {
        eviction_hints: false,
        non_coherent: false,
        max_prefetch: PrefetchDistance::None,
    };

    /// Whether the tier understands any qualifier at all
    pub const fn any(self) -> bool {
        self.eviction_hints || self.non_coherent || !matches!(self.max_prefetch, PrefetchDistance::None)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Compile-time tier marker
pub trait Tier: sealed::Sealed + Copy + Default + 'static {
    const TIER: HardwareTier;
    const FEATURES: TierFeatures = Self::TIER.features();
}

macro_rules! tier_marker {
    ($($name:ident),*) => {
        $(
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            pub struct $name;

            impl sealed::Sealed for $name {}

            impl Tier for $name {
                const TIER: HardwareTier = HardwareTier::$name;
            }
        )*
    };
}

tier_marker!(Baseline, Sm70, Sm75, Sm80);

#[cfg(feature = "sm80")]
pub type TargetTier = Sm80;

#[cfg(all(feature = "sm75", not(feature = "sm80")))]
pub type TargetTier = Sm75;

#[cfg(all(feature = "sm70", not(feature = "sm75")))]
pub type TargetTier = Sm70;

#[cfg(not(feature = "sm70"))]
pub type TargetTier = Baseline;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order() {
        assert!(HardwareTier::Baseline < HardwareTier::Sm70);
        assert!(HardwareTier::Sm70 < HardwareTier::Sm75);
        assert!(HardwareTier::Sm75 < HardwareTier::Sm80);
    }

    #[test]
    fn test_feature_rows_are_monotonic() {
        let ascending = [
            HardwareTier::Baseline,
            HardwareTier::Sm70,
            HardwareTier::Sm75,
            HardwareTier::Sm80,
        ];
        for pair in ascending.windows(2) {
            let (lo, hi) = (pair[0].features(), pair[1].features());
            assert!(lo.max_prefetch <= hi.max_prefetch);
            assert!(!lo.eviction_hints || hi.eviction_hints);
            assert!(!lo.non_coherent || hi.non_coherent);
        }
    }

    #[test]
    fn test_baseline_has_no_qualifiers() {
        assert!(!Baseline::FEATURES.any());
        assert!(Sm70::FEATURES.any());
        assert_eq!(Sm75::FEATURES.max_prefetch, PrefetchDistance::B128);
    }

    #[test]
    fn test_parse_tier() {
        assert_eq!("SM_75".parse::<HardwareTier>().unwrap(), HardwareTier::Sm75);
        assert_eq!("baseline".parse::<HardwareTier>().unwrap(), HardwareTier::Baseline);
        assert!("sm90".parse::<HardwareTier>().is_err());
    }

    #[test]
    fn test_target_tier_matches_features() {
        let expected = if cfg!(feature = "sm80") {
            HardwareTier::Sm80
        } else if cfg!(feature = "sm75") {
            HardwareTier::Sm75
        } else if cfg!(feature = "sm70") {
            HardwareTier::Sm70
        } else {
            HardwareTier::Baseline
        };
        assert_eq!(TargetTier::TIER, expected);
    }
}
