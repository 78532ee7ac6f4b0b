//! Typed store entry points
//!
//! Stores mirror loads with a single qualifier, the eviction policy.
//!
//! ```compile_fail
//! use kernmem::movement::{AlignedSize, DataMover, SimulatedEmitter};
//! use kernmem::policy::EvictNone;
//!
//! let mut data = [0u32; 2];
//! let mover = DataMover::new(SimulatedEmitter::new());
//! // alignment below align_of::<u32>()
//! unsafe { mover.store_array(&[1u32, 2], data.as_mut_ptr(), AlignedSize::<2>, EvictNone) };
//! ```
//!
//! ```compile_fail
//! use kernmem::movement::{DataMover, SimulatedEmitter};
//! use kernmem::policy::EvictUnchanged;
//!
//! let mut slot = [0u32; 7];
//! let mover = DataMover::new(SimulatedEmitter::new());
//! // a 28-byte value cannot take a qualified store
//! unsafe { mover.store([1u32; 7], &mut slot, EvictUnchanged) };
//! ```

use bytemuck::Pod;

use super::chunk::{AlignedBytes16, AlignedSize, ChunkAlign};
use super::emit::Emitter;
use super::form::{MAX_ACCESS_BYTES, StoreForm};
use super::load::DataMover;
use super::select::{is_plain_store, store_form};
use crate::policy::Eviction;
use crate::tier::Tier;

impl<Em: Emitter, Ti: Tier> DataMover<Em, Ti> {
    /// Store one `T` to global memory
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes of `T`, aligned to `align_of::<T>()` (to
    /// 16 bytes for qualified stores wider than 16 bytes) and point to
    /// device-accessible global memory.
    pub unsafe fn store<T: Pod, E: Eviction>(&self, value: T, ptr: *mut T, _eviction: E) {
        let plain = const { is_plain_store(E::POLICY) };
        const {
            assert!(
                is_plain_store(E::POLICY) || size_of::<T>().is_power_of_two(),
                "'size_of::<T>()' must be a power of 2"
            )
        };

        debug_assert!(!ptr.is_null(), "'ptr' must not be null");
        debug_assert!(ptr.is_aligned(), "'ptr' must be aligned");
        debug_assert!(self.emitter.is_global(ptr.addr()), "'ptr' must point to global memory");

        if plain {
            // SAFETY: caller guarantees a valid, aligned pointer
            unsafe { ptr.write(value) };
            return;
        }

        let form = const { store_form::<Ti, E>() };
        if size_of::<T>() > MAX_ACCESS_BYTES {
            debug_assert!(
                ptr.addr() % MAX_ACCESS_BYTES == 0,
                "'ptr' must be 16-byte aligned for stores wider than 16 bytes"
            );
            // SAFETY: size is a power of two above 16, so it is a whole number of chunks
            unsafe {
                unroll_store::<_, AlignedBytes16>(&self.emitter, ptr.cast(), bytemuck::bytes_of(&value), Some(form))
            };
        } else {
            // SAFETY: forwarded from the caller
            unsafe { self.emitter.store(form, ptr, value) };
        }
    }

    /// Store `N` consecutive `T`s in chunks of `ALIGN` bytes
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes of `N` elements, aligned to `ALIGN` bytes
    /// and point to device-accessible global memory.
    pub unsafe fn store_array<const N: usize, const ALIGN: usize, T, E>(
        &self,
        values: &[T; N],
        ptr: *mut T,
        _align: AlignedSize<ALIGN>,
        _eviction: E,
    ) where
        T: Pod,
        AlignedSize<ALIGN>: ChunkAlign,
        E: Eviction,
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
            if is_plain_store(E::POLICY) {
                None
            } else {
                Some(store_form::<Ti, E>())
            }
        };

        // SAFETY: forwarded from the caller; the byte length is a whole number of chunks
        unsafe {
            unroll_store::<_, <AlignedSize<ALIGN> as ChunkAlign>::Chunk>(
                &self.emitter,
                ptr.cast(),
                bytemuck::cast_slice(&values[..]),
                form,
            )
        };
    }
}

/// Write `bytes` chunk by chunk to `dst`; `None` is the plain path
///
/// # Safety
///
/// `dst` must be valid for writes of `bytes.len()` bytes and aligned for `C`.
unsafe fn unroll_store<Em: Emitter, C: Pod>(emitter: &Em, dst: *mut C, bytes: &[u8], form: Option<StoreForm>) {
    for (i, src) in bytes.chunks_exact(size_of::<C>()).enumerate() {
        let chunk: C = bytemuck::pod_read_unaligned(src);
        // SAFETY: i < bytes.len() / size_of::<C>()
        let chunk_ptr = unsafe { dst.add(i) };
        match form {
            None => unsafe { chunk_ptr.write(chunk) },
            Some(form) => unsafe { emitter.store(form, chunk_ptr, chunk) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::SimulatedEmitter;
    use crate::policy::{EvictFirst, EvictNone};
    use crate::provenance::{self, MemorySpace};
    use crate::tier::{Sm70, Sm80};

    #[test]
    fn test_plain_store() {
        let mut slot = [0u32];
        let _reg = provenance::global()
            .register_slice(&slot, MemorySpace::Device)
            .unwrap();
        let mover = DataMover::with_tier(SimulatedEmitter::new(), Sm80);
        unsafe { mover.store(0xDEAD_BEEFu32, slot.as_mut_ptr(), EvictNone) };
        assert_eq!(slot[0], 0xDEAD_BEEF);
        assert_eq!(mover.emitter().emitted_count(), 0);
    }

    #[test]
    fn test_store_array_chunks() {
        let mut buffer = [0u64; 4];
        let _reg = provenance::global()
            .register_slice(&buffer, MemorySpace::Device)
            .unwrap();
        let mover = DataMover::with_tier(SimulatedEmitter::new(), Sm70);
        unsafe { mover.store_array(&[1u64, 2, 3, 4], buffer.as_mut_ptr(), AlignedSize::<8>, EvictFirst) };
        assert_eq!(buffer, [1, 2, 3, 4]);

        let log = mover.emitter().emitted();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0].mnemonic(), "st.global.L1::evict_first.b64");
    }
}
