//! Conjugating accessor adaptor
//!
//! [`ConjugatedAccessor`] yields the complex conjugate of every element it
//! reads. It is not space-qualified: it reports the accessibility of the
//! accessor it wraps, so a conjugated host view is still host-accessible.

use std::ops::Neg;

use super::accessor::{Accessor, AccessorPolicy};
use super::view::{Layout, MdView};
use crate::provenance::MemorySpace;

/// Element types with a conjugate
pub trait Conjugate {
    fn conj(self) -> Self;
}

macro_rules! real_conjugate {
    ($($ty:ty),*) => {
        $(
            impl Conjugate for $ty {
                fn conj(self) -> Self {
                    self
                }
            }
        )*
    };
}

real_conjugate!(f32, f64, i8, i16, i32, i64, u8, u16, u32, u64);

/// Complex number with the layout of `[T; 2]`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub const fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

impl<T: Neg<Output = T>> Conjugate for Complex<T> {
    fn conj(self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConjugatedAccessor<A> {
    nested: A,
}

impl<A: AccessorPolicy> ConjugatedAccessor<A> {
    pub const fn new(nested: A) -> Self {
        Self { nested }
    }

    pub fn nested(&self) -> &A {
        &self.nested
    }
}

impl<A: AccessorPolicy> AccessorPolicy for ConjugatedAccessor<A> {
    type Element = A::Element;
    type DataHandle = A::DataHandle;
    type Reference = A::Reference;
    type OffsetPolicy = ConjugatedAccessor<A::OffsetPolicy>;

    const SPACE: Option<MemorySpace> = None;
    const HOST_ACCESSIBLE: bool = A::HOST_ACCESSIBLE;
    const DEVICE_ACCESSIBLE: bool = A::DEVICE_ACCESSIBLE;

    fn detectably_invalid(&self, p: A::DataHandle, size: usize) -> bool {
        self.nested.detectably_invalid(p, size)
    }
}

impl<A: Accessor> Accessor for ConjugatedAccessor<A>
where
    A::Reference: Conjugate,
{
    unsafe fn access(&self, p: A::DataHandle, i: usize) -> A::Reference {
        // SAFETY: forwarded from the caller
        unsafe { self.nested.access(p, i) }.conj()
    }

    unsafe fn offset(&self, p: A::DataHandle, i: usize) -> A::DataHandle {
        // SAFETY: forwarded from the caller
        unsafe { self.nested.offset(p, i) }
    }
}

/// View whose elements read as their conjugates
pub fn conjugated<A, L, const R: usize>(view: MdView<A, L, R>) -> MdView<ConjugatedAccessor<A>, L, R>
where
    A: AccessorPolicy,
    L: Layout,
{
    view.map_accessor(ConjugatedAccessor::new)
}

/// Transposed view of a matrix
pub fn transposed<A: AccessorPolicy, L: Layout>(view: MdView<A, L, 2>) -> MdView<A, L::Transposed, 2> {
    view.transposed()
}

/// Conjugate transpose of a matrix
pub fn conjugate_transposed<A: AccessorPolicy, L: Layout>(
    view: MdView<A, L, 2>,
) -> MdView<ConjugatedAccessor<A>, L::Transposed, 2> {
    conjugated(transposed(view))
}
