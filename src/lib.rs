//! kernmem: memory-access primitives for GPU kernels
//!
//! - Tiered load/store dispatch: a policy (access mode, L1 eviction hint, L2
//!   prefetch distance) is lowered to the best instruction form the target
//!   tier provides, degrading silently where a qualifier is missing
//! - Bulk loads and stores split into fixed-width chunks
//! - Host, device and managed accessors that tie an mdspan-style view to a
//!   memory space, checked at compile time and against pointer provenance
//! - Warp shuffles
//!
//! Device execution is simulated on the host through [`SimulatedEmitter`]; the
//! crate uses `std` and is not built for `nvptx64`.
//!
//! # Architecture
//!
//! ```text
//! policy markers ─┐
//! tier markers ───┼─► select (const) ─► DataMover ─► chunk ─► Emitter
//!                 │
//! provenance ◄────┴── HostAccessor / DeviceAccessor / ManagedAccessor ◄── MdView
//! ```
//!
//! # Example
//!
//! ```
//! use kernmem::prelude::*;
//!
//! #[repr(align(16))]
//! struct Aligned([f32; 4]);
//!
//! let data = Aligned([1.0, 2.0, 3.0, 4.0]);
//! let _reg = provenance::global().register_slice(&data.0, MemorySpace::Device).unwrap();
//!
//! let mover = DataMover::with_tier(SimulatedEmitter::new(), Sm80);
//! let values: [f32; 4] = unsafe {
//!     mover.load_array(data.0.as_ptr(), AlignedSize::<16>, ReadOnly, EvictLast, Prefetch256B)
//! };
//! assert_eq!(values, data.0);
//! assert_eq!(mover.emitter().emitted_count(), 1);
//! ```

pub mod config;
pub mod diagnostics;
pub mod mdspan;
pub mod movement;
pub mod policy;
pub mod provenance;
pub mod tier;
pub mod warp;

pub use config::TierTable;
pub use diagnostics::{ConfigError, ParsePolicyError, PlanError, ProvenanceError, RegistryError};
pub use movement::{DataMover, Emitter, LoadForm, SimulatedEmitter, StoreForm};
pub use tier::{HardwareTier, TargetTier, TierFeatures};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a kernel-side caller usually needs
pub mod prelude {
    pub use crate::mdspan::{
        Accessor, AccessorPolicy, DefaultAccessor, DeviceAccessor, DeviceView, Extents, HostAccessor, HostView,
        LayoutLeft, LayoutRight, ManagedAccessor, ManagedView, MdView,
    };
    pub use crate::movement::{AlignedSize, DataMover, Emitter, SimulatedEmitter};
    pub use crate::policy::{
        EvictFirst, EvictLast, EvictNone, EvictNormal, EvictUnchanged, NoAllocate, Prefetch64B, Prefetch128B,
        Prefetch256B, PrefetchNone, ReadOnly, ReadWrite,
    };
    pub use crate::provenance::{self, MemorySpace};
    pub use crate::tier::{Baseline, Sm70, Sm75, Sm80, TargetTier};
    pub use crate::warp::{FULL_MASK, Warp};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
