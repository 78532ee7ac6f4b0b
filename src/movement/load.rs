//! Typed load entry points
//!
//! [`DataMover`] pairs an [`Emitter`] with a compile-time tier. Every policy
//! argument is a zero-sized marker, so the form each call lowers to is a
//! constant of its monomorphisation:
//!
//! ```
//! use kernmem::movement::{DataMover, SimulatedEmitter};
//! use kernmem::policy::{EvictFirst, Prefetch256B, ReadOnly};
//! use kernmem::provenance::{self, MemorySpace};
//! use kernmem::tier::Sm75;
//!
//! let data = [0xDEAD_BEEFu32];
//! let _reg = provenance::global().register_slice(&data, MemorySpace::Device).unwrap();
//!
//! let mover = DataMover::with_tier(SimulatedEmitter::new(), Sm75);
//! let value = unsafe { mover.load(data.as_ptr(), ReadOnly, EvictFirst, Prefetch256B) };
//! assert_eq!(value, 0xDEAD_BEEF);
//! // Sm75 tops out at 128-byte prefetch
//! assert_eq!(
//!     mover.emitter().emitted()[0].mnemonic(),
//!     "ld.global.nc.L1::evict_first.L2::128B.b32"
//! );
//! ```
//!
//! Element counts and alignments are checked when the call is compiled:
//!
//! ```compile_fail
//! use kernmem::movement::{AlignedSize, DataMover, SimulatedEmitter};
//! use kernmem::policy::{EvictNone, PrefetchNone, ReadWrite};
//!
//! let data = [1u32, 2, 3];
//! let mover = DataMover::new(SimulatedEmitter::new());
//! // 12 bytes cannot be split into 8-byte chunks
//! let _: [u32; 3] = unsafe {
//!     mover.load_array(data.as_ptr(), AlignedSize::<8>, ReadWrite, EvictNone, PrefetchNone)
//! };
//! ```
//!
//! ```compile_fail
//! use kernmem::movement::{AlignedSize, DataMover, SimulatedEmitter};
//! use kernmem::policy::{EvictNone, PrefetchNone, ReadWrite};
//!
//! let data = [1u32];
//! let mover = DataMover::new(SimulatedEmitter::new());
//! let _: [u32; 0] = unsafe {
//!     mover.load_array(data.as_ptr(), AlignedSize::<4>, ReadWrite, EvictNone, PrefetchNone)
//! };
//! ```
//!
//! ```compile_fail
//! use kernmem::movement::{AlignedSize, DataMover, SimulatedEmitter};
//! use kernmem::policy::{EvictNone, PrefetchNone, ReadWrite};
//!
//! let data = [1u32, 2, 3, 4, 5, 6, 7, 8];
//! let mover = DataMover::new(SimulatedEmitter::new());
//! // 32-byte alignment has no chunk type
//! let _: [u32; 8] = unsafe {
//!     mover.load_array(data.as_ptr(), AlignedSize::<32>, ReadWrite, EvictNone, PrefetchNone)
//! };
//! ```

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

use super::chunk::{AlignedBytes16, AlignedSize, ChunkAlign};
use super::emit::Emitter;
use super::form::{LoadForm, MAX_ACCESS_BYTES};
use super::select::{is_plain_load, load_form};
use crate::policy::{Eviction, MemoryAccess, Prefetch};
use crate::tier::{HardwareTier, TargetTier, Tier};
use crate::warp::Warp;

/// Load/store driver for one emitter and tier
#[derive(Debug, Clone, Default)]
pub struct DataMover<Em, Ti = TargetTier> {
    pub(super) emitter: Em,
    tier: PhantomData<Ti>,
}

impl<Em: Emitter> DataMover<Em, TargetTier> {
    /// Driver for the tier this crate was compiled for
    pub fn new(emitter: Em) -> Self {
        Self {
            emitter,
            tier: PhantomData,
        }
    }
}

impl<Em: Emitter, Ti: Tier> DataMover<Em, Ti> {
    /// Driver for an explicit tier
    pub fn with_tier(emitter: Em, _tier: Ti) -> Self {
        Self {
            emitter,
            tier: PhantomData,
        }
    }

    pub fn tier(&self) -> HardwareTier {
        Ti::TIER
    }

    pub fn emitter(&self) -> &Em {
        &self.emitter
    }

    pub fn into_emitter(self) -> Em {
        self.emitter
    }

    /// Shuffle entry points sharing this driver's emitter
    pub fn warp(&self) -> Warp<'_, Em> {
        Warp::new(&self.emitter)
    }

    /// Load one `T` from global memory
    ///
    /// `ReadWrite` with `EvictNone` and `PrefetchNone` is a plain read. Any
    /// other combination requires a power-of-two `size_of::<T>()`; values
    /// wider than 16 bytes are split into 16-byte accesses.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `T`, aligned to `align_of::<T>()` (to
    /// 16 bytes for qualified loads wider than 16 bytes) and point to
    /// device-accessible global memory.
    pub unsafe fn load<T: Pod, A: MemoryAccess, E: Eviction, P: Prefetch>(
        &self,
        ptr: *const T,
        _access: A,
        _eviction: E,
        _prefetch: P,
    ) -> T {
        let plain = const { is_plain_load(A::MODE, E::POLICY, P::DISTANCE) };
        const {
            assert!(
                is_plain_load(A::MODE, E::POLICY, P::DISTANCE) || size_of::<T>().is_power_of_two(),
                "'size_of::<T>()' must be a power of 2"
            )
        };

        debug_assert!(!ptr.is_null(), "'ptr' must not be null");
        debug_assert!(ptr.is_aligned(), "'ptr' must be aligned");
        debug_assert!(self.emitter.is_global(ptr.addr()), "'ptr' must point to global memory");

        if plain {
            // SAFETY: caller guarantees a valid, aligned pointer
            return unsafe { ptr.read() };
        }

        let form = const { load_form::<Ti, A, E, P>() };
        if size_of::<T>() > MAX_ACCESS_BYTES {
            debug_assert!(
                ptr.addr() % MAX_ACCESS_BYTES == 0,
                "'ptr' must be 16-byte aligned for loads wider than 16 bytes"
            );
            let mut out = T::zeroed();
            // SAFETY: size is a power of two above 16, so it is a whole number of chunks
            unsafe {
                unroll_load::<_, AlignedBytes16>(
                    &self.emitter,
                    ptr.cast(),
                    bytemuck::bytes_of_mut(&mut out),
                    Some(form),
                )
            };
            out
        } else {
            // SAFETY: forwarded from the caller
            unsafe { self.emitter.load(form, ptr) }
        }
    }

    /// Load `N` consecutive `T`s in chunks of `ALIGN` bytes
    ///
    /// Emits `size_of::<T>() * N / ALIGN` independent accesses.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `N` elements, aligned to `ALIGN` bytes
    /// and point to device-accessible global memory.
    pub unsafe fn load_array<const N: usize, const ALIGN: usize, T, A, E, P>(
        &self,
        ptr: *const T,
        _align: AlignedSize<ALIGN>,
        _access: A,
        _eviction: E,
        _prefetch: P,
    ) -> [T; N]
    where
        T: Pod,
        AlignedSize<ALIGN>: ChunkAlign,
        A: MemoryAccess,
        E: Eviction,
        P: Prefetch,
    {
        const {
            assert!(N > 0, "'N' must be greater than 0");
            assert!(ALIGN >= align_of::<T>(), "'ALIGN' must be greater than or equal to 'align_of::<T>()'");
            assert!(size_of::<T>() * N % ALIGN == 0, "'N * size_of::<T>()' must be a multiple of 'ALIGN'");
        };

        debug_assert!(!ptr.is_null(), "'ptr' must not be null");
        debug_assert!(ptr.addr() % ALIGN == 0, "'ptr' must be aligned");
        debug_assert!(self.emitter.is_global(ptr.addr()), "'ptr' must point to global memory");

        let form = const {
            if is_plain_load(A::MODE, E::POLICY, P::DISTANCE) {
                None
            } else {
                Some(load_form::<Ti, A, E, P>())
            }
        };

        let mut out = [T::zeroed(); N];
        // SAFETY: forwarded from the caller; the const checks above make the
        // byte length a whole number of chunks
        unsafe {
            unroll_load::<_, <AlignedSize<ALIGN> as ChunkAlign>::Chunk>(
                &self.emitter,
                ptr.cast(),
                bytemuck::cast_slice_mut(&mut out[..]),
                form,
            )
        };
        out
    }
}

/// Fill `out` chunk by chunk from `src`; `None` is the plain path
///
/// # Safety
///
/// `src` must be valid for reads of `out.len()` bytes and aligned for `C`.
unsafe fn unroll_load<Em: Emitter, C: Pod>(
    emitter: &Em,
    src: *const C,
    out: &mut [u8],
    form: Option<LoadForm>,
) {
    for (i, dst) in out.chunks_exact_mut(size_of::<C>()).enumerate() {
        // SAFETY: i < out.len() / size_of::<C>()
        let chunk_ptr = unsafe { src.add(i) };
        let chunk = match form {
            None => unsafe { chunk_ptr.read() },
            Some(form) => unsafe { emitter.load(form, chunk_ptr) },
        };
        dst.copy_from_slice(bytemuck::bytes_of(&chunk));
    }
}
