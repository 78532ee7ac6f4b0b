//! Capability tags for memory instructions
//!
//! Every policy exists twice:
//! - as a plain enum ([`AccessMode`], [`EvictionPolicy`], [`PrefetchDistance`]) used by
//!   the selector, the planner and the CLI;
//! - as a zero-sized marker type ([`ReadOnly`], [`EvictFirst`], [`Prefetch128B`], ...)
//!   passed at call sites, so the choice is part of the monomorphised signature and
//!   the dispatch decision is fixed at compile time.
//!
//! ```
//! use kernmem::policy::{AccessMode, Eviction, EvictFirst, MemoryAccess, ReadOnly};
//!
//! assert_eq!(ReadOnly::MODE, AccessMode::ReadOnly);
//! assert_eq!(EvictFirst::POLICY.suffix(), Some("L1::evict_first"));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::diagnostics::ParsePolicyError;

mod sealed {
    pub trait Sealed {}
}

/// Memory access mode of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Data is not written by anyone while the kernel runs; eligible for the
    /// non-coherent (`.nc`) load family.
    ReadOnly,
    /// Default coherent access
    ReadWrite,
}

impl AccessMode {
    pub const ALL: [AccessMode; 2] = [AccessMode::ReadOnly, AccessMode::ReadWrite];

    pub const fn name(self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "read-only",
            AccessMode::ReadWrite => "read-write",
        }
    }
}

/// L1 cache eviction hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    None,
    Normal,
    First,
    Last,
    Unchanged,
    NoAllocate,
}

impl EvictionPolicy {
    pub const ALL: [EvictionPolicy; 6] = [
        EvictionPolicy::None,
        EvictionPolicy::Normal,
        EvictionPolicy::First,
        EvictionPolicy::Last,
        EvictionPolicy::Unchanged,
        EvictionPolicy::NoAllocate,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            EvictionPolicy::None => "none",
            EvictionPolicy::Normal => "normal",
            EvictionPolicy::First => "first",
            EvictionPolicy::Last => "last",
            EvictionPolicy::Unchanged => "unchanged",
            EvictionPolicy::NoAllocate => "no-allocate",
        }
    }

    /// Instruction qualifier for this policy. `None` keeps the default caching form.
    pub const fn suffix(self) -> Option<&'static str> {
        match self {
            EvictionPolicy::None => None,
            EvictionPolicy::Normal => Some("L1::evict_normal"),
            EvictionPolicy::First => Some("L1::evict_first"),
            EvictionPolicy::Last => Some("L1::evict_last"),
            EvictionPolicy::Unchanged => Some("L1::evict_unchanged"),
            EvictionPolicy::NoAllocate => Some("L1::no_allocate"),
        }
    }
}

/// L2 spatial prefetch distance
///
/// Ordered by width so a tier limit can be applied with a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrefetchDistance {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "64B")]
    B64,
    #[serde(rename = "128B")]
    B128,
    #[serde(rename = "256B")]
    B256,
}

impl PrefetchDistance {
    pub const ALL: [PrefetchDistance; 4] = [
        PrefetchDistance::None,
        PrefetchDistance::B64,
        PrefetchDistance::B128,
        PrefetchDistance::B256,
    ];

    /// Prefetch width in bytes (0 for none)
    pub const fn bytes(self) -> u32 {
        match self {
            PrefetchDistance::None => 0,
            PrefetchDistance::B64 => 64,
            PrefetchDistance::B128 => 128,
            PrefetchDistance::B256 => 256,
        }
    }

    /// `min` usable in const contexts
    pub const fn min(self, limit: PrefetchDistance) -> PrefetchDistance {
        if (self as u8) <= (limit as u8) { self } else { limit }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PrefetchDistance::None => "none",
            PrefetchDistance::B64 => "64B",
            PrefetchDistance::B128 => "128B",
            PrefetchDistance::B256 => "256B",
        }
    }

    pub const fn suffix(self) -> Option<&'static str> {
        match self {
            PrefetchDistance::None => None,
            PrefetchDistance::B64 => Some("L2::64B"),
            PrefetchDistance::B128 => Some("L2::128B"),
            PrefetchDistance::B256 => Some("L2::256B"),
        }
    }
}

macro_rules! display_and_parse {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = ParsePolicyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
                $ty::ALL
                    .into_iter()
                    .find(|v| v.name().to_ascii_lowercase() == wanted)
                    .ok_or_else(|| ParsePolicyError {
                        kind: $what,
                        value: s.to_string(),
                        expected: $ty::ALL.iter().map(|v| v.name()).collect::<Vec<_>>().join(", "),
                    })
            }
        }
    };
}

display_and_parse!(AccessMode, "access mode");
display_and_parse!(EvictionPolicy, "eviction policy");
display_and_parse!(PrefetchDistance, "prefetch distance");

// ==================== Marker types ====================

/// Access-mode marker
pub trait MemoryAccess: sealed::Sealed + Copy + Default {
    const MODE: AccessMode;
}

/// Eviction-policy marker
pub trait Eviction: sealed::Sealed + Copy + Default {
    const POLICY: EvictionPolicy;
}

/// Prefetch-distance marker
pub trait Prefetch: sealed::Sealed + Copy + Default {
    const DISTANCE: PrefetchDistance;
}

macro_rules! marker {
    ($(#[$doc:meta])* $name:ident : $tr:ident :: $konst:ident : $ty:ty = $value:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl $tr for $name {
            const $konst: $ty = $value;
        }
    };
}

marker!(ReadOnly: MemoryAccess::MODE: AccessMode = AccessMode::ReadOnly);
marker!(
    /// Default access; combined with [`EvictNone`] and [`PrefetchNone`] it takes the plain path.
    ReadWrite: MemoryAccess::MODE: AccessMode = AccessMode::ReadWrite
);

marker!(EvictNone: Eviction::POLICY: EvictionPolicy = EvictionPolicy::None);
marker!(EvictNormal: Eviction::POLICY: EvictionPolicy = EvictionPolicy::Normal);
marker!(EvictFirst: Eviction::POLICY: EvictionPolicy = EvictionPolicy::First);
marker!(EvictLast: Eviction::POLICY: EvictionPolicy = EvictionPolicy::Last);
marker!(EvictUnchanged: Eviction::POLICY: EvictionPolicy = EvictionPolicy::Unchanged);
marker!(
    /// Do not allocate the line in L1
    NoAllocate: Eviction::POLICY: EvictionPolicy = EvictionPolicy::NoAllocate
);

marker!(PrefetchNone: Prefetch::DISTANCE: PrefetchDistance = PrefetchDistance::None);
marker!(Prefetch64B: Prefetch::DISTANCE: PrefetchDistance = PrefetchDistance::B64);
marker!(Prefetch128B: Prefetch::DISTANCE: PrefetchDistance = PrefetchDistance::B128);
marker!(Prefetch256B: Prefetch::DISTANCE: PrefetchDistance = PrefetchDistance::B256);
