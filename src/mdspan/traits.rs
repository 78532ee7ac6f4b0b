//! Compile-time accessibility queries
//!
//! ```
//! use kernmem::mdspan::traits::*;
//! use kernmem::mdspan::{ConjugatedAccessor, DefaultAccessor, HostAccessor, ManagedAccessor};
//!
//! type Managed = ManagedAccessor<DefaultAccessor<f32>>;
//! const _: () = assert!(is_host_accessible::<Managed>() && is_device_accessible::<Managed>());
//!
//! // adaptors report what they wrap
//! type Conj = ConjugatedAccessor<HostAccessor<DefaultAccessor<f32>>>;
//! assert!(is_host_accessible::<Conj>());
//! assert!(!is_host_accessor::<Conj>());
//! ```

use super::accessor::AccessorPolicy;
use crate::provenance::MemorySpace;

pub const fn is_host_accessible<A: AccessorPolicy>() -> bool {
    A::HOST_ACCESSIBLE
}

pub const fn is_device_accessible<A: AccessorPolicy>() -> bool {
    A::DEVICE_ACCESSIBLE
}

pub const fn is_host_accessor<A: AccessorPolicy>() -> bool {
    matches!(A::SPACE, Some(MemorySpace::Host))
}

pub const fn is_device_accessor<A: AccessorPolicy>() -> bool {
    matches!(A::SPACE, Some(MemorySpace::Device))
}

pub const fn is_managed_accessor<A: AccessorPolicy>() -> bool {
    matches!(A::SPACE, Some(MemorySpace::Managed))
}

/// Any of the three space wrappers
pub const fn is_space_qualified<A: AccessorPolicy>() -> bool {
    A::SPACE.is_some()
}
