//! Tiered load/store selection
//!
//! Selection only reads a tier's [`TierFeatures`] row. Unsupported hints are
//! narrowed or dropped, never rejected: they are advisory and do not change
//! the loaded value.

use crate::policy::{AccessMode, Eviction, EvictionPolicy, MemoryAccess, Prefetch, PrefetchDistance};
use crate::tier::{Tier, TierFeatures};

use super::form::{LoadForm, StoreForm};

/// The combination that needs no qualifier on any tier
pub const fn is_plain_load(
    access: AccessMode,
    eviction: EvictionPolicy,
    prefetch: PrefetchDistance,
) -> bool {
    matches!(access, AccessMode::ReadWrite)
        && matches!(eviction, EvictionPolicy::None)
        && matches!(prefetch, PrefetchDistance::None)
}

pub const fn is_plain_store(eviction: EvictionPolicy) -> bool {
    matches!(eviction, EvictionPolicy::None)
}

/// Pick the load form for a tier
pub const fn select_load(
    features: TierFeatures,
    access: AccessMode,
    eviction: EvictionPolicy,
    prefetch: PrefetchDistance,
) -> LoadForm {
    if !features.any() {
        return LoadForm::Generic;
    }

    // 256B on a 128B tier becomes 128B; any request on a tier without prefetch becomes none
    let prefetch = prefetch.min(features.max_prefetch);

    let eviction = if features.eviction_hints {
        eviction
    } else {
        EvictionPolicy::None
    };

    let access = match access {
        AccessMode::ReadOnly if features.non_coherent => AccessMode::ReadOnly,
        AccessMode::ReadOnly | AccessMode::ReadWrite => AccessMode::ReadWrite,
    };

    LoadForm::Global {
        access,
        eviction,
        prefetch,
    }
}

/// Pick the store form for a tier
pub const fn select_store(features: TierFeatures, eviction: EvictionPolicy) -> StoreForm {
    if !features.any() {
        return StoreForm::Generic;
    }
    if features.eviction_hints {
        StoreForm::Global { eviction }
    } else {
        StoreForm::PLAIN_GLOBAL
    }
}

/// Load form for a set of marker types
pub const fn load_form<Ti: Tier, A: MemoryAccess, E: Eviction, P: Prefetch>() -> LoadForm {
    select_load(Ti::FEATURES, A::MODE, E::POLICY, P::DISTANCE)
}

/// Store form for a set of marker types
pub const fn store_form<Ti: Tier, E: Eviction>() -> StoreForm {
    select_store(Ti::FEATURES, E::POLICY)
}
