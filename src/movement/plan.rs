//! Runtime dispatch planning
//!
//! The typed entry points fix every decision at compile time. The planner
//! makes the same decisions from runtime values, through the same selector and
//! chunk arithmetic, so a request can be inspected (or checked against a
//! custom tier table) without compiling a kernel. Preconditions the typed
//! path enforces as compile errors come back as [`PlanError`]s.

use std::fmt;

use serde::Serialize;

use super::chunk::chunk_count;
use super::form::{LoadForm, MAX_ACCESS_BYTES};
use super::select::{is_plain_load, select_load};
use crate::diagnostics::PlanError;
use crate::policy::{AccessMode, EvictionPolicy, PrefetchDistance};
use crate::tier::TierFeatures;

/// Shape and policies of one load call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadRequest {
    pub element_size: usize,
    pub element_align: usize,
    /// Number of elements; the scalar entry point when 1 and no alignment is given
    pub count: usize,
    /// Chunk alignment of an array load
    pub align: Option<usize>,
    pub access: AccessMode,
    pub eviction: EvictionPolicy,
    pub prefetch: PrefetchDistance,
}

impl LoadRequest {
    pub fn new(element_size: usize, element_align: usize) -> Self {
        Self {
            element_size,
            element_align,
            count: 1,
            align: None,
            access: AccessMode::ReadWrite,
            eviction: EvictionPolicy::None,
            prefetch: PrefetchDistance::None,
        }
    }

    /// Request shaped like a load of `T`
    pub fn of<T>() -> Self {
        Self::new(size_of::<T>(), align_of::<T>())
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn aligned(mut self, align: usize) -> Self {
        self.align = Some(align);
        self
    }

    pub fn access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    pub fn eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn prefetch(mut self, prefetch: PrefetchDistance) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn is_array(&self) -> bool {
        self.count != 1 || self.align.is_some()
    }

    /// Bytes covered by the request; `None` when the product overflows
    pub fn total_bytes(&self) -> Option<usize> {
        self.element_size.checked_mul(self.count)
    }
}

/// What a load lowers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadPlan {
    /// Selected form; `None` is the plain path that bypasses the emitter
    pub form: Option<LoadForm>,
    pub chunk_bytes: usize,
    pub chunk_count: usize,
    /// Mnemonic of every emitted chunk access
    pub mnemonic: Option<String>,
}

impl LoadPlan {
    pub fn is_plain(&self) -> bool {
        self.form.is_none()
    }

    /// Number of emitter calls the load makes
    pub fn emitted(&self) -> usize {
        if self.is_plain() { 0 } else { self.chunk_count }
    }

    fn new(form: Option<LoadForm>, chunk_bytes: usize, chunk_count: usize) -> Self {
        Self {
            form,
            chunk_bytes,
            chunk_count,
            mnemonic: form.map(|f| f.mnemonic(chunk_bytes)),
        }
    }
}

impl fmt::Display for LoadPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mnemonic {
            Some(mnemonic) => write!(f, "{} x {mnemonic}", self.chunk_count),
            None => write!(f, "{} x plain {}-byte read", self.chunk_count, self.chunk_bytes),
        }
    }
}

/// Plan a load for a tier's feature row
pub fn plan_load(features: TierFeatures, req: &LoadRequest) -> Result<LoadPlan, PlanError> {
    if !req.element_align.is_power_of_two() {
        return Err(PlanError::ElementAlignment {
            element_align: req.element_align,
        });
    }
    if req.count == 0 || req.element_size == 0 {
        return Err(PlanError::Empty);
    }

    let plain = is_plain_load(req.access, req.eviction, req.prefetch);
    let form = (!plain).then(|| select_load(features, req.access, req.eviction, req.prefetch));

    let plan = if req.is_array() {
        let align = req.align.unwrap_or(req.element_align);
        check_array_alignment(req, align)?;
        let chunks = chunk_count(req.element_size, req.count, align).ok_or(PlanError::TooLarge {
            count: req.count,
            size: req.element_size,
        })?;
        LoadPlan::new(form, align, chunks)
    } else if plain {
        LoadPlan::new(None, req.element_size, 1)
    } else {
        let size = req.element_size;
        if !size.is_power_of_two() {
            return Err(PlanError::SizeNotPowerOfTwo { size });
        }
        if size > MAX_ACCESS_BYTES {
            LoadPlan::new(form, MAX_ACCESS_BYTES, size / MAX_ACCESS_BYTES)
        } else {
            LoadPlan::new(form, size, 1)
        }
    };

    tracing::debug!(?req, plan = %plan, "planned load");
    Ok(plan)
}

fn check_array_alignment(req: &LoadRequest, align: usize) -> Result<(), PlanError> {
    if !align.is_power_of_two() {
        return Err(PlanError::AlignmentNotPowerOfTwo { align });
    }
    if align > MAX_ACCESS_BYTES {
        return Err(PlanError::AlignmentTooLarge { align });
    }
    if align < req.element_align {
        return Err(PlanError::AlignmentTooSmall {
            align,
            element_align: req.element_align,
        });
    }
    let Some(total) = req.total_bytes() else {
        return Err(PlanError::TooLarge {
            count: req.count,
            size: req.element_size,
        });
    };
    if total % align != 0 {
        return Err(PlanError::NotMultiple {
            count: req.count,
            size: req.element_size,
            align,
        });
    }
    Ok(())
}

/// One row of a tier's dispatch table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchRow {
    pub access: AccessMode,
    pub eviction: EvictionPolicy,
    pub prefetch: PrefetchDistance,
    pub form: Option<LoadForm>,
    pub mnemonic: String,
}

/// Form chosen for every policy combination at access width `width`
pub fn dispatch_table(features: TierFeatures, width: usize) -> Vec<DispatchRow> {
    let mut rows = Vec::with_capacity(AccessMode::ALL.len() * EvictionPolicy::ALL.len() * PrefetchDistance::ALL.len());
    for access in AccessMode::ALL {
        for eviction in EvictionPolicy::ALL {
            for prefetch in PrefetchDistance::ALL {
                let form = (!is_plain_load(access, eviction, prefetch))
                    .then(|| select_load(features, access, eviction, prefetch));
                let mnemonic = match form {
                    Some(form) => form.mnemonic(width),
                    None => "plain".to_string(),
                };
                rows.push(DispatchRow {
                    access,
                    eviction,
                    prefetch,
                    form,
                    mnemonic,
                });
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::HardwareTier;

    #[test]
    fn test_scalar_plain() {
        let plan = plan_load(HardwareTier::Sm80.features(), &LoadRequest::of::<[u32; 7]>()).unwrap();
        assert!(plan.is_plain());
        assert_eq!(plan.emitted(), 0);
    }

    #[test]
    fn test_scalar_rejects_odd_size_when_qualified() {
        let req = LoadRequest::of::<[u32; 7]>().access(AccessMode::ReadOnly);
        assert_eq!(
            plan_load(HardwareTier::Sm80.features(), &req),
            Err(PlanError::SizeNotPowerOfTwo { size: 28 })
        );
    }

    #[test]
    fn test_wide_scalar_is_chunked() {
        let req = LoadRequest::new(64, 4).eviction(EvictionPolicy::First);
        let plan = plan_load(HardwareTier::Sm70.features(), &req).unwrap();
        assert_eq!((plan.chunk_bytes, plan.chunk_count), (16, 4));
        assert_eq!(plan.mnemonic.as_deref(), Some("ld.global.L1::evict_first.b128"));
    }

    #[test]
    fn test_array_alignment_errors() {
        let features = HardwareTier::Sm75.features();
        let base = LoadRequest::of::<u32>().count(2);
        assert_eq!(
            plan_load(features, &base.aligned(6)),
            Err(PlanError::AlignmentNotPowerOfTwo { align: 6 })
        );
        assert_eq!(
            plan_load(features, &base.aligned(2)),
            Err(PlanError::AlignmentTooSmall {
                align: 2,
                element_align: 4
            })
        );
        assert_eq!(
            plan_load(features, &base.aligned(32)),
            Err(PlanError::AlignmentTooLarge { align: 32 })
        );
        assert_eq!(
            plan_load(features, &base.count(3).aligned(8)),
            Err(PlanError::NotMultiple {
                count: 3,
                size: 4,
                align: 8
            })
        );
        assert_eq!(plan_load(features, &base.count(0)), Err(PlanError::Empty));
    }

    #[test]
    fn test_oversized_request_is_an_error() {
        let features = HardwareTier::Sm80.features();
        let req = LoadRequest::new(usize::MAX, 1).count(2).aligned(1);
        assert_eq!(req.total_bytes(), None);
        assert_eq!(
            plan_load(features, &req),
            Err(PlanError::TooLarge {
                count: 2,
                size: usize::MAX
            })
        );

        // same without an explicit alignment
        let req = LoadRequest::new(1 << (usize::BITS - 1), 1).count(2).access(AccessMode::ReadOnly);
        assert!(matches!(plan_load(features, &req), Err(PlanError::TooLarge { count: 2, .. })));
    }

    #[test]
    fn test_dispatch_table_covers_all_combinations() {
        let rows = dispatch_table(HardwareTier::Baseline.features(), 4);
        assert_eq!(rows.len(), 48);
        assert_eq!(rows.iter().filter(|r| r.form.is_none()).count(), 1);
        assert!(rows
            .iter()
            .filter_map(|r| r.form)
            .all(|f| f == LoadForm::Generic));
    }
}
