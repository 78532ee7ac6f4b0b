//! Tier-table configuration
//!
//! The typed path always uses the built-in feature rows. The planner and the
//! `kmem` inspector can use a table with rows overridden from TOML, to model
//! a target whose published instruction set differs:
//!
//! ```toml
//! [tiers.sm75]
//! max_prefetch = "256B"
//!
//! [tiers.sm70]
//! non_coherent = false
//! ```
//!
//! Fields left out keep their built-in value.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diagnostics::ConfigError;
use crate::policy::PrefetchDistance;
use crate::tier::{HardwareTier, TierFeatures};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TierTableFile {
    #[serde(default)]
    tiers: BTreeMap<String, TierOverride>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TierOverride {
    eviction_hints: Option<bool>,
    non_coherent: Option<bool>,
    max_prefetch: Option<PrefetchDistance>,
}

impl TierOverride {
    fn apply(&self, base: TierFeatures) -> TierFeatures {
        TierFeatures {
            eviction_hints: self.eviction_hints.unwrap_or(base.eviction_hints),
            non_coherent: self.non_coherent.unwrap_or(base.non_coherent),
            max_prefetch: self.max_prefetch.unwrap_or(base.max_prefetch),
        }
    }
}

/// Feature row for every tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierTable {
    rows: BTreeMap<HardwareTier, TierFeatures>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TierTable {
    pub fn builtin() -> Self {
        let rows = HardwareTier::DESCENDING
            .into_iter()
            .map(|tier| (tier, tier.features()))
            .collect();
        Self { rows }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: TierTableFile = toml::from_str(source)?;
        let mut table = Self::builtin();

        for (name, over) in &file.tiers {
            let tier: HardwareTier = name.parse().map_err(|_| ConfigError::UnknownTier { name: name.clone() })?;
            let row = over.apply(tier.features());
            tracing::debug!(%tier, ?row, "tier row overridden");
            table.rows.insert(tier, row);
        }

        table.warn_if_not_monotonic();
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loading tier table");
        Self::from_toml_str(&source)
    }

    pub fn features(&self, tier: HardwareTier) -> TierFeatures {
        self.rows.get(&tier).copied().unwrap_or_else(|| tier.features())
    }

    /// Rows from least to most capable
    pub fn rows(&self) -> impl Iterator<Item = (HardwareTier, TierFeatures)> + '_ {
        self.rows.iter().map(|(&tier, &row)| (tier, row))
    }

    /// Whether `tier` still has its built-in row
    pub fn is_builtin(&self, tier: HardwareTier) -> bool {
        self.features(tier) == tier.features()
    }

    fn warn_if_not_monotonic(&self) {
        let rows: Vec<_> = self.rows().collect();
        for pair in rows.windows(2) {
            let ((lo_tier, lo), (hi_tier, hi)) = (pair[0], pair[1]);
            let regresses = lo.max_prefetch > hi.max_prefetch
                || (lo.eviction_hints && !hi.eviction_hints)
                || (lo.non_coherent && !hi.non_coherent);
            if regresses {
                tracing::warn!(%lo_tier, %hi_tier, "tier table loses features on a higher tier");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_matches_tiers() {
        let table = TierTable::builtin();
        for tier in HardwareTier::DESCENDING {
            assert_eq!(table.features(tier), tier.features());
            assert!(table.is_builtin(tier));
        }
        assert_eq!(table.rows().count(), 4);
    }

    #[test]
    fn test_partial_override() {
        let table = TierTable::from_toml_str(
            r#"
            [tiers.sm75]
            max_prefetch = "256B"
            "#,
        )
        .unwrap();
        let row = table.features(HardwareTier::Sm75);
        assert_eq!(row.max_prefetch, PrefetchDistance::B256);
        assert!(row.eviction_hints);
        assert!(!table.is_builtin(HardwareTier::Sm75));
        assert!(table.is_builtin(HardwareTier::Sm80));
    }

    #[test]
    fn test_unknown_tier() {
        let err = TierTable::from_toml_str("[tiers.sm90]\nnon_coherent = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTier { name } if name == "sm90"));
    }

    #[test]
    fn test_unknown_field_is_a_parse_error() {
        let err = TierTable::from_toml_str("[tiers.sm70]\nprefetch = \"64B\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_empty_file_is_builtin() {
        assert_eq!(TierTable::from_toml_str("").unwrap(), TierTable::builtin());
    }
}
