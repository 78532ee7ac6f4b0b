//! Primitive instruction forms
//!
//! A form is what the selector decides and what an [`Emitter`](super::Emitter)
//! executes. The catalog is closed: every combination of qualifiers a form can
//! carry has exactly one mnemonic.

use std::fmt;

use serde::Serialize;

use crate::policy::{AccessMode, EvictionPolicy, PrefetchDistance};

/// Widest access a single instruction performs
pub const MAX_ACCESS_BYTES: usize = 16;

/// A selected load primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LoadForm {
    /// Bare dereference through a generic address; every hint is dropped
    Generic,
    /// Global-space load with the resolved qualifiers
    Global {
        access: AccessMode,
        eviction: EvictionPolicy,
        prefetch: PrefetchDistance,
    },
}

/// A selected store primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StoreForm {
    Generic,
    Global { eviction: EvictionPolicy },
}

impl LoadForm {
    /// `ld.global` without qualifiers
    pub const PLAIN_GLOBAL: LoadForm = LoadForm::Global {
        access: AccessMode::ReadWrite,
        eviction: EvictionPolicy::None,
        prefetch: PrefetchDistance::None,
    };

    /// Mnemonic for an access of `width` bytes, e.g. `ld.global.nc.L1::evict_last.L2::128B.b64`
    pub fn mnemonic(&self, width: usize) -> String {
        let mut out = String::from("ld");
        match *self {
            LoadForm::Generic => {}
            LoadForm::Global {
                access,
                eviction,
                prefetch,
            } => {
                out.push_str(".global");
                if access == AccessMode::ReadOnly {
                    out.push_str(".nc");
                }
                push_qualifier(&mut out, eviction.suffix());
                push_qualifier(&mut out, prefetch.suffix());
            }
        }
        push_width(&mut out, width);
        out
    }
}

impl StoreForm {
    pub const PLAIN_GLOBAL: StoreForm = StoreForm::Global {
        eviction: EvictionPolicy::None,
    };

    pub fn mnemonic(&self, width: usize) -> String {
        let mut out = String::from("st");
        match *self {
            StoreForm::Generic => {}
            StoreForm::Global { eviction } => {
                out.push_str(".global");
                push_qualifier(&mut out, eviction.suffix());
            }
        }
        push_width(&mut out, width);
        out
    }
}

fn push_qualifier(out: &mut String, qualifier: Option<&str>) {
    if let Some(q) = qualifier {
        out.push('.');
        out.push_str(q);
    }
}

fn push_width(out: &mut String, width: usize) {
    debug_assert!(
        width.is_power_of_two() && width <= MAX_ACCESS_BYTES,
        "instruction width must be a power of two no wider than 16 bytes"
    );
    out.push_str(".b");
    out.push_str(&(width * 8).to_string());
}

impl fmt::Display for LoadForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadForm::Generic => write!(f, "generic"),
            LoadForm::Global {
                access,
                eviction,
                prefetch,
            } => write!(f, "global({access}, evict {eviction}, prefetch {prefetch})"),
        }
    }
}

impl fmt::Display for StoreForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreForm::Generic => write!(f, "generic"),
            StoreForm::Global { eviction } => write!(f, "global(evict {eviction})"),
        }
    }
}
