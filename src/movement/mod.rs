//! Data movement
//!
//! Tiered load/store dispatch: the selector picks an instruction form per
//! tier, the driver splits accesses into fixed-width chunks and hands each to
//! an [`Emitter`].

pub mod chunk;
pub mod emit;
pub mod form;
pub mod load;
pub mod plan;
pub mod select;
pub mod store;

pub use chunk::{AlignedBytes1, AlignedBytes2, AlignedBytes4, AlignedBytes8, AlignedBytes16, AlignedSize, ChunkAlign};
pub use emit::{Emitted, Emitter, SimulatedEmitter, WarpState};
pub use form::{LoadForm, MAX_ACCESS_BYTES, StoreForm};
pub use load::DataMover;
pub use plan::{DispatchRow, LoadPlan, LoadRequest, dispatch_table, plan_load};
pub use select::{load_form, select_load, select_store, store_form};
