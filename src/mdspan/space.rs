//! Memory-space qualified accessors
//!
//! [`HostAccessor`], [`DeviceAccessor`] and [`ManagedAccessor`] wrap a plain
//! accessor and tie it to a memory space:
//!
//! | wrapper   | host build                      | device build (`nvptx64`) |
//! |-----------|---------------------------------|--------------------------|
//! | host      | checks host residency           | not implemented          |
//! | device    | not implemented                 | unchecked                |
//! | managed   | checks managed residency        | unchecked                |
//!
//! Residency checks are debug assertions backed by the provenance registry.
//!
//! The device column is modelled, not built: the crate depends on `std`
//! (the registry, logging and config), so it does not compile for `nvptx64`.
//! The `cfg` split keeps the host/device contract visible and checked on the
//! host side.
//!
//! A device accessor has no element access on the host:
//!
//! ```compile_fail
//! use kernmem::mdspan::{Accessor, DefaultAccessor, DeviceAccessor};
//!
//! let data = [1u32, 2, 3];
//! let acc = DeviceAccessor::new(DefaultAccessor::<u32>::new());
//! let _ = unsafe { acc.access(data.as_ptr(), 0) };
//! ```
//!
//! Wrappers do not nest:
//!
//! ```compile_fail
//! use kernmem::mdspan::{DefaultAccessor, HostAccessor, ManagedAccessor};
//!
//! let _ = HostAccessor::new(ManagedAccessor::new(DefaultAccessor::<u32>::new()));
//! ```
//!
//! Conversions only widen, from managed to host or device:
//!
//! ```compile_fail
//! use kernmem::mdspan::{DefaultAccessor, HostAccessor, ManagedAccessor};
//!
//! let host = HostAccessor::new(DefaultAccessor::<u32>::new());
//! let _: ManagedAccessor<DefaultAccessor<u32>> = host.into();
//! ```

use super::accessor::{Accessor, AccessorPolicy, DataHandle};
use crate::provenance::{self, MemoryKind, MemorySpace};

macro_rules! space_accessor {
    (
        $(#[$doc:meta])*
        $name:ident, $space:ident, host: $host:literal, device: $device:literal
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name<A> {
            inner: A,
        }

        impl<A: AccessorPolicy> $name<A> {
            pub const fn new(inner: A) -> Self {
                const {
                    assert!(
                        A::SPACE.is_none(),
                        "HostAccessor/DeviceAccessor/ManagedAccessor cannot be nested"
                    )
                };
                Self { inner }
            }

            pub const fn inner(&self) -> &A {
                &self.inner
            }

            pub fn into_inner(self) -> A {
                self.inner
            }
        }

        impl<A: AccessorPolicy + Default> Default for $name<A> {
            fn default() -> Self {
                Self::new(A::default())
            }
        }

        impl<A: AccessorPolicy> AccessorPolicy for $name<A> {
            type Element = A::Element;
            type DataHandle = A::DataHandle;
            type Reference = A::Reference;
            type OffsetPolicy = $name<A::OffsetPolicy>;

            const SPACE: Option<MemorySpace> = Some(MemorySpace::$space);
            const HOST_ACCESSIBLE: bool = $host;
            const DEVICE_ACCESSIBLE: bool = $device;

            fn detectably_invalid(&self, p: A::DataHandle, size: usize) -> bool {
                size != 0 && Self::proves_invalid(p, size)
            }
        }
    };
}

space_accessor!(
    /// Accessor restricted to host code over host-accessible memory
    HostAccessor, Host, host: true, device: false
);

space_accessor!(
    /// Accessor restricted to device code
    DeviceAccessor, Device, host: false, device: true
);

space_accessor!(
    /// Accessor over managed memory, usable from both sides
    ManagedAccessor, Managed, host: true, device: true
);

impl<A: AccessorPolicy> From<ManagedAccessor<A>> for HostAccessor<A> {
    fn from(managed: ManagedAccessor<A>) -> Self {
        Self::new(managed.into_inner())
    }
}

impl<A: AccessorPolicy> From<ManagedAccessor<A>> for DeviceAccessor<A> {
    fn from(managed: ManagedAccessor<A>) -> Self {
        Self::new(managed.into_inner())
    }
}

// ==================== Provenance checks ====================

/// Host-accessible, or cannot be classified
fn is_host_accessible_at<H: DataHandle>(p: H, i: usize) -> bool {
    p.element_address(i)
        .is_none_or(|addr| provenance::attributes_at(addr).is_host_accessible())
}

/// Managed, or cannot be classified
fn is_managed_at<H: DataHandle>(p: H, i: usize) -> bool {
    p.element_address(i)
        .is_none_or(|addr| provenance::attributes_at(addr).is_managed())
}

/// Registered as memory the device cannot reach
fn is_host_only_at<H: DataHandle>(p: H, i: usize) -> bool {
    p.element_address(i).is_some_and(|addr| {
        let attrs = provenance::attributes_at(addr);
        attrs.kind != MemoryKind::Unregistered && !attrs.is_device_accessible()
    })
}

impl<A: AccessorPolicy> HostAccessor<A> {
    fn proves_invalid(p: A::DataHandle, size: usize) -> bool {
        if cfg!(target_arch = "nvptx64") {
            return false;
        }
        !(is_host_accessible_at(p, 0) && is_host_accessible_at(p, size - 1))
    }
}

impl<A: AccessorPolicy> DeviceAccessor<A> {
    fn proves_invalid(p: A::DataHandle, size: usize) -> bool {
        if cfg!(target_arch = "nvptx64") {
            return false;
        }
        is_host_only_at(p, 0) || is_host_only_at(p, size - 1)
    }
}

impl<A: AccessorPolicy> ManagedAccessor<A> {
    fn proves_invalid(p: A::DataHandle, size: usize) -> bool {
        if cfg!(target_arch = "nvptx64") {
            return false;
        }
        !(is_managed_at(p, 0) && is_managed_at(p, size - 1))
    }
}

// ==================== Element access ====================

#[cfg(not(target_arch = "nvptx64"))]
impl<A: Accessor> Accessor for HostAccessor<A> {
    unsafe fn access(&self, p: A::DataHandle, i: usize) -> A::Reference {
        debug_assert!(
            is_host_accessible_at(p, 0),
            "HostAccessor data handle is not a HOST pointer"
        );
        // SAFETY: forwarded from the caller
        unsafe { self.inner.access(p, i) }
    }

    unsafe fn offset(&self, p: A::DataHandle, i: usize) -> A::DataHandle {
        debug_assert!(
            is_host_accessible_at(p, 0),
            "HostAccessor data handle is not a HOST pointer"
        );
        // SAFETY: forwarded from the caller
        unsafe { self.inner.offset(p, i) }
    }
}

#[cfg(target_arch = "nvptx64")]
impl<A: Accessor> Accessor for DeviceAccessor<A> {
    unsafe fn access(&self, p: A::DataHandle, i: usize) -> A::Reference {
        // SAFETY: forwarded from the caller
        unsafe { self.inner.access(p, i) }
    }

    unsafe fn offset(&self, p: A::DataHandle, i: usize) -> A::DataHandle {
        // SAFETY: forwarded from the caller
        unsafe { self.inner.offset(p, i) }
    }
}

impl<A: Accessor> Accessor for ManagedAccessor<A> {
    unsafe fn access(&self, p: A::DataHandle, i: usize) -> A::Reference {
        #[cfg(not(target_arch = "nvptx64"))]
        debug_assert!(
            is_managed_at(p, 0),
            "ManagedAccessor data handle is not a MANAGED pointer"
        );
        // SAFETY: forwarded from the caller
        unsafe { self.inner.access(p, i) }
    }

    unsafe fn offset(&self, p: A::DataHandle, i: usize) -> A::DataHandle {
        #[cfg(not(target_arch = "nvptx64"))]
        debug_assert!(
            is_managed_at(p, 0),
            "ManagedAccessor data handle is not a MANAGED pointer"
        );
        // SAFETY: forwarded from the caller
        unsafe { self.inner.offset(p, i) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdspan::DefaultAccessor;
    use crate::provenance::global;

    type Host = HostAccessor<DefaultAccessor<u32>>;
    type Managed = ManagedAccessor<DefaultAccessor<u32>>;
    type Device = DeviceAccessor<DefaultAccessor<u32>>;

    #[test]
    fn test_host_access_on_unregistered_memory() {
        let data = [10u32, 20, 30];
        let acc = Host::default();
        assert_eq!(unsafe { acc.access(data.as_ptr(), 1) }, 20);
        assert!(!acc.detectably_invalid(data.as_ptr(), 3));
    }

    #[test]
    fn test_managed_access_on_managed_memory() {
        let data = [1u32, 2, 3, 4];
        let _reg = global().register_slice(&data, MemorySpace::Managed).unwrap();
        let acc = Managed::default();
        unsafe {
            let p = acc.offset(data.as_ptr(), 2);
            assert_eq!(acc.access(p, 1), 4);
        }
        assert!(!acc.detectably_invalid(data.as_ptr(), 4));
    }

    #[test]
    fn test_detectably_invalid() {
        let device = [0u32; 4];
        let host = [0u32; 4];
        let _d = global().register_slice(&device, MemorySpace::Device).unwrap();
        let _h = global().register_slice(&host, MemorySpace::Host).unwrap();

        assert!(Host::default().detectably_invalid(device.as_ptr(), 4));
        assert!(Managed::default().detectably_invalid(device.as_ptr(), 4));
        assert!(Managed::default().detectably_invalid(host.as_ptr(), 4));
        assert!(Device::default().detectably_invalid(host.as_ptr(), 4));
        assert!(!Device::default().detectably_invalid(device.as_ptr(), 4));

        // nothing to access, nothing to prove
        assert!(!Host::default().detectably_invalid(device.as_ptr(), 0));
    }

    #[test]
    fn test_widening_conversions() {
        let managed = Managed::default();
        let host: Host = managed.into();
        let device: Device = managed.into();
        assert_eq!(Host::SPACE, Some(MemorySpace::Host));
        assert_eq!(Device::SPACE, Some(MemorySpace::Device));

        let data = [5u32, 6];
        let plain = host.into_inner();
        assert_eq!(unsafe { plain.access(data.as_ptr(), 1) }, 6);
        let _ = device.inner();
    }
}
