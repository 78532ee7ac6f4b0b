//! Alignment tags and the fixed-width chunk types bulk accesses are split into

use bytemuck::{Pod, Zeroable};
use static_assertions::{assert_eq_size, const_assert_eq};

mod sealed {
    pub trait Sealed {}
}

/// Alignment (in bytes) promised for an array access
///
/// Only powers of two up to 16 implement [`ChunkAlign`]; any other value is
/// rejected when the access is compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AlignedSize<const N: usize>;

/// An alignment that maps to a chunk type of exactly that size and alignment
pub trait ChunkAlign: sealed::Sealed + Copy + Default {
    type Chunk: Pod;
    const BYTES: usize;
}

macro_rules! aligned_chunk {
    ($($name:ident = $n:literal),* $(,)?) => {
        $(
            #[doc = concat!("Raw ", stringify!($n), "-byte chunk aligned to its size")]
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            #[repr(C, align($n))]
            pub struct $name(pub [u8; $n]);

            // SAFETY: a single byte array field, no padding (size == align == $n),
            // every bit pattern valid.
            unsafe impl Zeroable for $name {}
            unsafe impl Pod for $name {}

            assert_eq_size!($name, [u8; $n]);
            const_assert_eq!(std::mem::align_of::<$name>(), $n);

            impl sealed::Sealed for AlignedSize<$n> {}

            impl ChunkAlign for AlignedSize<$n> {
                type Chunk = $name;
                const BYTES: usize = $n;
            }
        )*
    };
}

aligned_chunk!(
    AlignedBytes1 = 1,
    AlignedBytes2 = 2,
    AlignedBytes4 = 4,
    AlignedBytes8 = 8,
    AlignedBytes16 = 16,
);

/// Number of chunk accesses needed for `count` elements of `size` bytes
///
/// `None` when the byte total overflows `usize`.
pub const fn chunk_count(size: usize, count: usize, align: usize) -> Option<usize> {
    match size.checked_mul(count) {
        Some(total) => Some(total / align),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_layouts() {
        assert_eq!(std::mem::size_of::<AlignedBytes16>(), 16);
        assert_eq!(std::mem::align_of::<AlignedBytes8>(), 8);
        assert_eq!(<AlignedSize<4> as ChunkAlign>::BYTES, 4);
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(64, 2, 16), Some(8));
        assert_eq!(chunk_count(4, 4, 16), Some(1));
        assert_eq!(chunk_count(4, 3, 4), Some(3));
        assert_eq!(chunk_count(usize::MAX, 2, 1), None);
    }

    #[test]
    fn test_chunk_bytes_roundtrip() {
        let chunk = AlignedBytes4([1, 2, 3, 4]);
        let word: u32 = bytemuck::cast(chunk);
        assert_eq!(word.to_ne_bytes(), [1, 2, 3, 4]);
    }
}
