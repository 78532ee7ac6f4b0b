//! Instruction emission
//!
//! The [`Emitter`] is the seam between dispatch and hardware: it receives an
//! already-selected form and performs exactly one instruction. On a device
//! build that is inline assembly; [`SimulatedEmitter`] executes forms against
//! host memory and records what would have been emitted, which is what the
//! test suites and the inspector observe.

use std::cell::RefCell;
use std::fmt;

use bytemuck::Pod;
use serde::Serialize;

use super::form::{LoadForm, StoreForm};
use crate::provenance;
use crate::warp::{self, ShuffleOp, WARP_SIZE};

/// One-instruction primitives the dispatch layer is built on
pub trait Emitter {
    /// Execute a single load of `C`
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `C` and aligned to `align_of::<C>()`.
    unsafe fn load<C: Pod>(&self, form: LoadForm, ptr: *const C) -> C;

    /// Execute a single store of `C`
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes of `C` and aligned to `align_of::<C>()`.
    unsafe fn store<C: Pod>(&self, form: StoreForm, ptr: *mut C, value: C);

    /// Whether `addr` is reachable through the global state space
    fn is_global(&self, addr: usize) -> bool;

    fn lane_id(&self) -> u32;

    fn active_mask(&self) -> u32;

    /// Execute a `shfl.sync`; returns the source lane's value and the predicate
    fn shuffle(&self, op: ShuffleOp, data: u32) -> (u32, bool);
}

impl<E: Emitter + ?Sized> Emitter for &E {
    unsafe fn load<C: Pod>(&self, form: LoadForm, ptr: *const C) -> C {
        unsafe { (**self).load(form, ptr) }
    }

    unsafe fn store<C: Pod>(&self, form: StoreForm, ptr: *mut C, value: C) {
        unsafe { (**self).store(form, ptr, value) }
    }

    fn is_global(&self, addr: usize) -> bool {
        (**self).is_global(addr)
    }

    fn lane_id(&self) -> u32 {
        (**self).lane_id()
    }

    fn active_mask(&self) -> u32 {
        (**self).active_mask()
    }

    fn shuffle(&self, op: ShuffleOp, data: u32) -> (u32, bool) {
        (**self).shuffle(op, data)
    }
}

/// A recorded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Emitted {
    Load { form: LoadForm, width: usize },
    Store { form: StoreForm, width: usize },
    Shuffle(ShuffleOp),
}

impl Emitted {
    pub fn mnemonic(&self) -> String {
        match self {
            Emitted::Load { form, width } => form.mnemonic(*width),
            Emitted::Store { form, width } => form.mnemonic(*width),
            Emitted::Shuffle(op) => op.mnemonic(),
        }
    }

    pub fn width(&self) -> usize {
        match self {
            Emitted::Load { width, .. } | Emitted::Store { width, .. } => *width,
            Emitted::Shuffle(_) => 4,
        }
    }
}

impl fmt::Display for Emitted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic())
    }
}

/// Register file of a simulated warp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarpState {
    /// Lane this emitter executes as
    pub lane: u32,
    pub active_mask: u32,
    /// Value every lane contributes to the next shuffle
    pub registers: [u32; 32],
}

/// Host-memory emitter that logs every instruction it executes
///
/// Global-space membership is answered by the process-wide
/// [`provenance`] registry. Without a configured warp the emitter behaves as
/// lane 0 of a warp with only that lane active.
#[derive(Debug, Default)]
pub struct SimulatedEmitter {
    log: RefCell<Vec<Emitted>>,
    warp: Option<WarpState>,
}

impl SimulatedEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitter running as `lane` of a warp whose lanes hold `registers`
    ///
    /// Only the low five bits of `lane` are kept, like `%laneid`.
    pub fn with_warp(lane: u32, active_mask: u32, registers: [u32; 32]) -> Self {
        Self {
            log: RefCell::default(),
            warp: Some(WarpState {
                lane: lane % WARP_SIZE,
                active_mask,
                registers,
            }),
        }
    }

    /// Instructions emitted so far, oldest first
    pub fn emitted(&self) -> Vec<Emitted> {
        self.log.borrow().clone()
    }

    /// Drain the instruction log
    pub fn take_emitted(&self) -> Vec<Emitted> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    pub fn emitted_count(&self) -> usize {
        self.log.borrow().len()
    }

    fn record(&self, instr: Emitted) {
        tracing::trace!(instr = %instr, "emit");
        self.log.borrow_mut().push(instr);
    }
}

impl Emitter for SimulatedEmitter {
    unsafe fn load<C: Pod>(&self, form: LoadForm, ptr: *const C) -> C {
        self.record(Emitted::Load {
            form,
            width: size_of::<C>(),
        });
        // SAFETY: forwarded from the caller
        unsafe { ptr.read() }
    }

    unsafe fn store<C: Pod>(&self, form: StoreForm, ptr: *mut C, value: C) {
        self.record(Emitted::Store {
            form,
            width: size_of::<C>(),
        });
        // SAFETY: forwarded from the caller
        unsafe { ptr.write(value) }
    }

    fn is_global(&self, addr: usize) -> bool {
        provenance::attributes_at(addr).is_global()
    }

    fn lane_id(&self) -> u32 {
        self.warp.as_ref().map_or(0, |w| w.lane)
    }

    fn active_mask(&self) -> u32 {
        self.warp.as_ref().map_or(1, |w| w.active_mask)
    }

    fn shuffle(&self, op: ShuffleOp, data: u32) -> (u32, bool) {
        self.record(Emitted::Shuffle(op));
        let Some(state) = &self.warp else {
            let (_, valid) = warp::source_lane(op.mode, 0, op.lane_idx_offset, op.clamp_segmask);
            return (data, valid);
        };

        let mut registers = state.registers;
        registers[state.lane as usize] = data;
        let (src, valid) = warp::source_lane(op.mode, state.lane, op.lane_idx_offset, op.clamp_segmask);
        (registers[src as usize], valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AccessMode, EvictionPolicy, PrefetchDistance};
    use crate::warp::{FULL_MASK, ShuffleMode};

    #[test]
    fn test_records_loads_and_stores() {
        let emitter = SimulatedEmitter::new();
        let mut slot = 7u64;
        let form = LoadForm::Global {
            access: AccessMode::ReadOnly,
            eviction: EvictionPolicy::Last,
            prefetch: PrefetchDistance::None,
        };

        let value = unsafe { emitter.load(form, &slot as *const u64) };
        unsafe { emitter.store(StoreForm::Generic, &mut slot as *mut u64, value + 1) };

        assert_eq!(slot, 8);
        let log = emitter.take_emitted();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].mnemonic(), "ld.global.nc.L1::evict_last.b64");
        assert_eq!(log[1].mnemonic(), "st.b64");
        assert_eq!(emitter.emitted_count(), 0);
    }

    #[test]
    fn test_single_lane_defaults() {
        let emitter = SimulatedEmitter::new();
        assert_eq!(emitter.lane_id(), 0);
        assert_eq!(emitter.active_mask(), 1);
    }

    #[test]
    fn test_warp_shuffle_reads_source_register() {
        let registers: [u32; 32] = std::array::from_fn(|i| 100 + i as u32);
        let emitter = SimulatedEmitter::with_warp(3, FULL_MASK, registers);
        let op = ShuffleOp {
            mode: ShuffleMode::Up,
            lane_idx_offset: 2,
            clamp_segmask: 0,
            lane_mask: FULL_MASK,
        };
        assert_eq!(emitter.shuffle(op, 999), (101, true));

        let op = ShuffleOp {
            lane_idx_offset: 0,
            ..op
        };
        // lane 3 reads itself, which is the value it passed in
        assert_eq!(emitter.shuffle(op, 999), (999, true));
    }

    #[test]
    fn test_lane_id_wraps_to_warp() {
        let registers: [u32; 32] = std::array::from_fn(|i| 100 + i as u32);
        let emitter = SimulatedEmitter::with_warp(35, FULL_MASK, registers);
        assert_eq!(emitter.lane_id(), 3);

        let op = ShuffleOp {
            mode: ShuffleMode::Down,
            lane_idx_offset: 1,
            clamp_segmask: 0x1f,
            lane_mask: FULL_MASK,
        };
        assert_eq!(emitter.shuffle(op, 999), (104, true));
    }
}
