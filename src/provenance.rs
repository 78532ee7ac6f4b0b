//! Pointer provenance
//!
//! Classifies an address as host, device, managed or unregistered memory. On a
//! real system this is the driver's pointer-attribute query; here it is a
//! registry of address ranges that allocators (and tests) register into.
//! Queries never mutate the registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{ProvenanceError, RegistryError};

/// Memory space an accessor or allocation is qualified with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySpace {
    Host,
    Device,
    Managed,
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemorySpace::Host => write!(f, "host"),
            MemorySpace::Device => write!(f, "device"),
            MemorySpace::Managed => write!(f, "managed"),
        }
    }
}

/// Result of a provenance query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemoryKind {
    /// Not known to the runtime; treated as ordinary host memory
    Unregistered,
    Host,
    Device,
    Managed,
}

impl From<MemorySpace> for MemoryKind {
    fn from(space: MemorySpace) -> Self {
        match space {
            MemorySpace::Host => MemoryKind::Host,
            MemorySpace::Device => MemoryKind::Device,
            MemorySpace::Managed => MemoryKind::Managed,
        }
    }
}

/// Attributes of one address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointerAttributes {
    pub kind: MemoryKind,
    /// Address through which the host reaches this memory
    pub host_pointer: Option<usize>,
    /// Address through which the device reaches this memory
    pub device_pointer: Option<usize>,
}

impl PointerAttributes {
    pub const fn unregistered() -> Self {
        Self {
            kind: MemoryKind::Unregistered,
            host_pointer: None,
            device_pointer: None,
        }
    }

    fn of_space(space: MemorySpace, addr: usize) -> Self {
        let (host_pointer, device_pointer) = match space {
            MemorySpace::Host => (Some(addr), None),
            MemorySpace::Device => (None, Some(addr)),
            MemorySpace::Managed => (Some(addr), Some(addr)),
        };
        Self {
            kind: space.into(),
            host_pointer,
            device_pointer,
        }
    }

    /// Host pointer present, or the runtime cannot classify the address
    pub fn is_host_accessible(&self) -> bool {
        self.host_pointer.is_some() || self.kind == MemoryKind::Unregistered
    }

    pub fn is_device_accessible(&self) -> bool {
        self.device_pointer.is_some()
    }

    /// Device pointer present and identical to the host pointer
    pub fn is_managed(&self) -> bool {
        matches!(self.device_pointer, Some(dev) if self.host_pointer == Some(dev))
    }

    /// Reachable through the global state space
    pub fn is_global(&self) -> bool {
        self.is_device_accessible()
    }
}

/// Pointer-attribute query service
pub trait PointerQuery {
    fn query(&self, addr: usize) -> Result<PointerAttributes, ProvenanceError>;
}

#[derive(Debug, Clone, Copy)]
struct Region {
    end: usize,
    space: MemorySpace,
}

/// Registry of address ranges and the space each belongs to
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    regions: RwLock<BTreeMap<usize, Region>>,
}

impl MemoryRegistry {
    pub const fn new() -> Self {
        Self {
            regions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register `len` bytes starting at `addr`
    ///
    /// The range stays registered until the returned guard is dropped.
    pub fn register(
        &self,
        addr: usize,
        len: usize,
        space: MemorySpace,
    ) -> Result<Registration<'_>, RegistryError> {
        if addr == 0 {
            return Err(RegistryError::NullRange);
        }
        if len == 0 {
            return Err(RegistryError::EmptyRange { addr });
        }
        let end = addr.saturating_add(len);

        let mut regions = self.regions.write().map_err(|_| ProvenanceError::Poisoned)?;
        if let Some((&other_start, other)) = regions.range(..end).next_back() {
            if other.end > addr {
                return Err(RegistryError::Overlap {
                    start: addr,
                    end,
                    other_start,
                    other_end: other.end,
                });
            }
        }
        regions.insert(addr, Region { end, space });
        tracing::trace!(start = addr, end, %space, "registered memory range");

        Ok(Registration {
            registry: self,
            start: addr,
        })
    }

    /// Register the memory backing a slice
    pub fn register_slice<T>(
        &self,
        slice: &[T],
        space: MemorySpace,
    ) -> Result<Registration<'_>, RegistryError> {
        self.register(slice.as_ptr().addr(), std::mem::size_of_val(slice), space)
    }

    /// Remove the range starting at `addr`; returns whether one was registered
    pub fn unregister(&self, addr: usize) -> bool {
        // A poisoned map is still structurally valid, removal stays safe
        let mut regions = match self.regions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let removed = regions.remove(&addr).is_some();
        if removed {
            tracing::trace!(start = addr, "unregistered memory range");
        }
        removed
    }

    /// Number of registered ranges
    pub fn len(&self) -> usize {
        self.regions.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PointerQuery for MemoryRegistry {
    fn query(&self, addr: usize) -> Result<PointerAttributes, ProvenanceError> {
        let regions = self.regions.read().map_err(|_| ProvenanceError::Poisoned)?;
        let attributes = match regions.range(..=addr).next_back() {
            Some((_, region)) if addr < region.end => PointerAttributes::of_space(region.space, addr),
            _ => PointerAttributes::unregistered(),
        };
        Ok(attributes)
    }
}

/// Keeps a range registered; unregisters it on drop
#[derive(Debug)]
#[must_use = "the range is unregistered as soon as the registration is dropped"]
pub struct Registration<'r> {
    registry: &'r MemoryRegistry,
    start: usize,
}

impl Registration<'_> {
    pub fn start(&self) -> usize {
        self.start
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.unregister(self.start);
    }
}

static GLOBAL: MemoryRegistry = MemoryRegistry::new();

/// The process-wide registry consulted by accessors and the simulated emitter
pub fn global() -> &'static MemoryRegistry {
    &GLOBAL
}

/// Attributes of `addr` from the global registry
///
/// # Panics
///
/// If the query itself fails. A pointer in the wrong space is not a failure.
pub fn attributes_at(addr: usize) -> PointerAttributes {
    match GLOBAL.query(addr) {
        Ok(attributes) => attributes,
        Err(err) => panic!("{err}"),
    }
}
