//! Element-access policies
//!
//! An accessor turns a data handle and an element index into an element. The
//! associated types and accessibility constants live in [`AccessorPolicy`]
//! and are available on every target; the operations live in [`Accessor`],
//! which space-qualified wrappers only implement where they may run.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::provenance::MemorySpace;

/// Handle an accessor indexes from
pub trait DataHandle: Copy {
    /// Address of element `i`, or `None` for handles that are not raw
    /// pointers and therefore cannot be classified
    fn element_address(self, i: usize) -> Option<usize>;
}

impl<T> DataHandle for *const T {
    fn element_address(self, i: usize) -> Option<usize> {
        Some(self.wrapping_add(i).addr())
    }
}

impl<T> DataHandle for *mut T {
    fn element_address(self, i: usize) -> Option<usize> {
        Some(self.wrapping_add(i).addr())
    }
}

impl<T> DataHandle for NonNull<T> {
    fn element_address(self, i: usize) -> Option<usize> {
        self.as_ptr().element_address(i)
    }
}

/// Types and capabilities of an accessor
pub trait AccessorPolicy: Clone {
    type Element;
    type DataHandle: DataHandle;
    type Reference;
    /// Accessor for a handle returned by [`Accessor::offset`]
    type OffsetPolicy: AccessorPolicy<DataHandle = Self::DataHandle>;

    /// Memory space this accessor is qualified with, if any
    const SPACE: Option<MemorySpace> = None;
    const HOST_ACCESSIBLE: bool = false;
    const DEVICE_ACCESSIBLE: bool = false;

    /// Whether `size` elements at `p` are provably invalid to access
    ///
    /// `false` means "cannot tell", not "valid".
    fn detectably_invalid(&self, _p: Self::DataHandle, _size: usize) -> bool {
        false
    }
}

/// Element access operations
pub trait Accessor: AccessorPolicy {
    /// # Safety
    ///
    /// `p` offset by `i` elements must be valid to read.
    unsafe fn access(&self, p: Self::DataHandle, i: usize) -> Self::Reference;

    /// # Safety
    ///
    /// `p` offset by `i` elements must stay within the same allocation.
    unsafe fn offset(&self, p: Self::DataHandle, i: usize) -> Self::DataHandle;
}

/// Plain accessor over a `*const T`, reading elements by value
pub struct DefaultAccessor<T> {
    element: PhantomData<fn() -> T>,
}

impl<T> DefaultAccessor<T> {
    pub const fn new() -> Self {
        Self { element: PhantomData }
    }
}

impl<T> Clone for DefaultAccessor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DefaultAccessor<T> {}

impl<T> Default for DefaultAccessor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DefaultAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DefaultAccessor<{}>", std::any::type_name::<T>())
    }
}

impl<T: Copy> AccessorPolicy for DefaultAccessor<T> {
    type Element = T;
    type DataHandle = *const T;
    type Reference = T;
    type OffsetPolicy = DefaultAccessor<T>;
}

impl<T: Copy> Accessor for DefaultAccessor<T> {
    unsafe fn access(&self, p: *const T, i: usize) -> T {
        // SAFETY: forwarded from the caller
        unsafe { p.add(i).read() }
    }

    unsafe fn offset(&self, p: *const T, i: usize) -> *const T {
        // SAFETY: forwarded from the caller
        unsafe { p.add(i) }
    }
}
