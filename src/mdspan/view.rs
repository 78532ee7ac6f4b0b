//! Multidimensional views
//!
//! [`MdView`] is a data handle plus extents, a layout mapping and an
//! accessor. Every element read goes through the accessor, so a view over a
//! space-qualified accessor inherits its residency checks.

use std::fmt;
use std::marker::PhantomData;

use super::accessor::{Accessor, AccessorPolicy, DefaultAccessor};
use super::space::{DeviceAccessor, HostAccessor, ManagedAccessor};

/// Dimensions of a rank-`R` view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extents<const R: usize>([usize; R]);

impl<const R: usize> Extents<R> {
    pub const fn new(dims: [usize; R]) -> Self {
        Self(dims)
    }

    pub const fn rank(&self) -> usize {
        R
    }

    pub fn extent(&self, r: usize) -> usize {
        self.0[r]
    }

    pub fn dims(&self) -> [usize; R] {
        self.0
    }

    /// Number of elements
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    pub fn contains(&self, idx: [usize; R]) -> bool {
        idx.iter().zip(self.0).all(|(&i, e)| i < e)
    }

    fn reversed(&self) -> Self {
        let mut dims = self.0;
        dims.reverse();
        Self(dims)
    }
}

impl<const R: usize> fmt::Display for Extents<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", dims.join(" x "))
    }
}

/// Index-to-offset mapping
pub trait Layout {
    /// Layout of the transposed view over the same storage
    type Transposed: Layout;

    fn offset<const R: usize>(extents: &Extents<R>, idx: [usize; R]) -> usize;
}

/// Row-major: the last index is contiguous
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutRight;

/// Column-major: the first index is contiguous
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutLeft;

impl Layout for LayoutRight {
    type Transposed = LayoutLeft;

    fn offset<const R: usize>(extents: &Extents<R>, idx: [usize; R]) -> usize {
        (0..R).fold(0, |acc, r| acc * extents.0[r] + idx[r])
    }
}

impl Layout for LayoutLeft {
    type Transposed = LayoutRight;

    fn offset<const R: usize>(extents: &Extents<R>, idx: [usize; R]) -> usize {
        (0..R).rev().fold(0, |acc, r| acc * extents.0[r] + idx[r])
    }
}

/// Non-owning view over `extents.size()` elements
#[derive(Debug, Clone)]
pub struct MdView<A: AccessorPolicy, L = LayoutRight, const R: usize = 1> {
    handle: A::DataHandle,
    extents: Extents<R>,
    accessor: A,
    layout: PhantomData<L>,
}

pub type HostView<T, L = LayoutRight, const R: usize = 1> = MdView<HostAccessor<DefaultAccessor<T>>, L, R>;
pub type DeviceView<T, L = LayoutRight, const R: usize = 1> = MdView<DeviceAccessor<DefaultAccessor<T>>, L, R>;
pub type ManagedView<T, L = LayoutRight, const R: usize = 1> = MdView<ManagedAccessor<DefaultAccessor<T>>, L, R>;

impl<A: AccessorPolicy + Default, L: Layout, const R: usize> MdView<A, L, R> {
    /// # Safety
    ///
    /// `handle` must be valid for `extents.size()` elements for the lifetime
    /// of the view.
    pub unsafe fn new(handle: A::DataHandle, extents: Extents<R>) -> Self {
        // SAFETY: forwarded from the caller
        unsafe { Self::with_accessor(handle, extents, A::default()) }
    }
}

impl<A: AccessorPolicy, L: Layout, const R: usize> MdView<A, L, R> {
    /// # Safety
    ///
    /// `handle` must be valid for `extents.size()` elements for the lifetime
    /// of the view.
    pub unsafe fn with_accessor(handle: A::DataHandle, extents: Extents<R>, accessor: A) -> Self {
        Self {
            handle,
            extents,
            accessor,
            layout: PhantomData,
        }
    }

    pub fn extents(&self) -> &Extents<R> {
        &self.extents
    }

    pub fn size(&self) -> usize {
        self.extents.size()
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    pub fn data_handle(&self) -> A::DataHandle {
        self.handle
    }

    /// Offset of `idx` into the underlying storage
    pub fn mapping(&self, idx: [usize; R]) -> usize {
        L::offset(&self.extents, idx)
    }

    /// Whether the accessor can prove the whole view invalid from here
    pub fn detectably_invalid(&self) -> bool {
        self.accessor.detectably_invalid(self.handle, self.size())
    }

    /// Same storage and shape through a different accessor
    pub fn map_accessor<B, F>(self, f: F) -> MdView<B, L, R>
    where
        B: AccessorPolicy<DataHandle = A::DataHandle>,
        F: FnOnce(A) -> B,
    {
        MdView {
            handle: self.handle,
            extents: self.extents,
            accessor: f(self.accessor),
            layout: PhantomData,
        }
    }

    /// Reinterpret the storage under `M` with new extents
    fn relayout<M: Layout>(self, extents: Extents<R>) -> MdView<A, M, R> {
        MdView {
            handle: self.handle,
            extents,
            accessor: self.accessor,
            layout: PhantomData,
        }
    }
}

impl<A: Accessor, L: Layout, const R: usize> MdView<A, L, R> {
    /// Element at `idx`
    ///
    /// # Panics
    ///
    /// If `idx` is outside the extents.
    pub fn get(&self, idx: [usize; R]) -> A::Reference {
        assert!(
            self.extents.contains(idx),
            "index {idx:?} out of bounds for extents {}",
            self.extents
        );
        // SAFETY: the handle covers `size()` elements and the index is in bounds
        unsafe { self.accessor.access(self.handle, self.mapping(idx)) }
    }
}

impl<A: AccessorPolicy, L: Layout> MdView<A, L, 2> {
    /// Swap the two indices without touching storage
    pub fn transposed(self) -> MdView<A, L::Transposed, 2> {
        let extents = self.extents.reversed();
        self.relayout(extents)
    }
}
