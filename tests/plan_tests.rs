//! Integration tests for the runtime planner and tier tables
//!
//! Tests for:
//! - Agreement between the planner and the typed entry points
//! - Tier tables overridden from TOML
//! - Serialized plan output

use kernmem::movement::{AlignedSize, DataMover, LoadPlan, LoadRequest, SimulatedEmitter, dispatch_table, plan_load};
use kernmem::policy::*;
use kernmem::provenance::{self, MemorySpace};
use kernmem::tier::{HardwareTier, Sm70, Sm75, Sm80, Tier};
use kernmem::{PlanError, TierTable};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[repr(C, align(16))]
struct Aligned16<T>(T);

// ==================== Agreement Tests ====================

#[test]
fn test_planner_matches_typed_array_load() {
    let data = Aligned16([0u32; 12]);
    let _reg = provenance::global()
        .register_slice(&data.0, MemorySpace::Device)
        .unwrap();
    let mover = DataMover::with_tier(SimulatedEmitter::new(), Sm75);
    let _: [u32; 12] =
        unsafe { mover.load_array(data.0.as_ptr(), AlignedSize::<16>, ReadOnly, EvictFirst, Prefetch256B) };

    let req = LoadRequest::of::<u32>()
        .count(12)
        .aligned(16)
        .access(AccessMode::ReadOnly)
        .eviction(EvictionPolicy::First)
        .prefetch(PrefetchDistance::B256);
    let plan = plan_load(Sm75::FEATURES, &req).unwrap();

    let log = mover.emitter().emitted();
    assert_eq!(plan.emitted(), log.len());
    assert!(log.iter().all(|e| Some(e.mnemonic()) == plan.mnemonic));
}

#[test]
fn test_planner_matches_typed_scalar_load() {
    let data = Aligned16([[1u64, 2, 3, 4]]);
    let _reg = provenance::global()
        .register_slice(&data.0, MemorySpace::Device)
        .unwrap();
    let mover = DataMover::with_tier(SimulatedEmitter::new(), Sm70);
    let _ = unsafe { mover.load(data.0.as_ptr(), ReadWrite, EvictUnchanged, PrefetchNone) };

    let req = LoadRequest::of::<[u64; 4]>().eviction(EvictionPolicy::Unchanged);
    let plan = plan_load(Sm70::FEATURES, &req).unwrap();

    let log = mover.emitter().emitted();
    assert_eq!((plan.chunk_count, plan.chunk_bytes), (2, 16));
    assert_eq!(log.len(), 2);
    assert_eq!(plan.mnemonic.as_deref(), Some("ld.global.L1::evict_unchanged.b128"));
    assert_eq!(log[0].mnemonic(), "ld.global.L1::evict_unchanged.b128");
}

#[test]
fn test_plain_plan_emits_nothing() {
    let plan = plan_load(Sm80::FEATURES, &LoadRequest::of::<[u8; 3]>().count(5)).unwrap();
    assert!(plan.is_plain());
    assert_eq!(plan.emitted(), 0);
    assert_eq!(plan.to_string(), "15 x plain 1-byte read");
}

// ==================== Error Tests ====================

#[test]
fn test_plan_errors() {
    let features = HardwareTier::Sm80.features();
    assert_eq!(
        plan_load(features, &LoadRequest::new(4, 3)),
        Err(PlanError::ElementAlignment { element_align: 3 })
    );
    assert_eq!(
        plan_load(features, &LoadRequest::new(0, 1).eviction(EvictionPolicy::Last)),
        Err(PlanError::Empty)
    );
    assert_eq!(
        plan_load(features, &LoadRequest::new(12, 4).prefetch(PrefetchDistance::B64)),
        Err(PlanError::SizeNotPowerOfTwo { size: 12 })
    );
    // the same shape is fine as an array
    assert!(plan_load(features, &LoadRequest::new(12, 4).aligned(4).prefetch(PrefetchDistance::B64)).is_ok());
}

#[test]
fn test_plan_overflow_is_reported() {
    let req = LoadRequest::new(usize::MAX, 1).count(2).aligned(1);
    let result = std::panic::catch_unwind(|| plan_load(HardwareTier::Sm80.features(), &req));
    let err = result.expect("planning must not panic").unwrap_err();
    assert_eq!(
        err,
        PlanError::TooLarge {
            count: 2,
            size: usize::MAX
        }
    );
    assert!(err.to_string().contains("does not fit in the address space"));
}

// ==================== Tier Table Tests ====================

#[test]
fn test_overridden_table_changes_plan() {
    let table = TierTable::from_toml_str(
        r#"
        [tiers.sm75]
        max_prefetch = "256B"

        [tiers.sm70]
        non_coherent = false
        "#,
    )
    .unwrap();

    let req = LoadRequest::of::<u64>()
        .access(AccessMode::ReadOnly)
        .prefetch(PrefetchDistance::B256);

    let sm75 = plan_load(table.features(HardwareTier::Sm75), &req).unwrap();
    assert_eq!(sm75.mnemonic.as_deref(), Some("ld.global.nc.L2::256B.b64"));

    let sm70 = plan_load(table.features(HardwareTier::Sm70), &req).unwrap();
    assert_eq!(sm70.mnemonic.as_deref(), Some("ld.global.b64"));

    // built-in rows are untouched
    let builtin = plan_load(HardwareTier::Sm75.features(), &req).unwrap();
    assert_eq!(builtin.mnemonic.as_deref(), Some("ld.global.nc.L2::128B.b64"));
}

#[test]
fn test_tier_table_load_from_file() {
    let path = std::env::temp_dir().join(format!("kernmem-tiers-{}.toml", std::process::id()));
    std::fs::write(&path, "[tiers.baseline]\neviction_hints = true\n").unwrap();
    let table = TierTable::load(&path);
    std::fs::remove_file(&path).unwrap();

    let table = table.unwrap();
    assert!(table.features(HardwareTier::Baseline).eviction_hints);
    assert!(!table.is_builtin(HardwareTier::Baseline));
}

#[test]
fn test_tier_table_missing_file() {
    let err = TierTable::load(std::path::Path::new("/nonexistent/kernmem/tiers.toml")).unwrap_err();
    assert!(err.to_string().contains("failed to read tier table"));
}

// ==================== Output Tests ====================

#[test]
fn test_dispatch_table_snapshot() {
    let lines: Vec<String> = dispatch_table(HardwareTier::Sm75.features(), 4)
        .into_iter()
        .filter(|row| {
            row.access == AccessMode::ReadOnly
                && matches!(row.eviction, EvictionPolicy::None | EvictionPolicy::First)
        })
        .map(|row| format!("{} {} {} -> {}", row.access, row.eviction, row.prefetch, row.mnemonic))
        .collect();

    insta::assert_snapshot!(lines.join("\n"), @r"
    read-only none none -> ld.global.nc.b32
    read-only none 64B -> ld.global.nc.L2::64B.b32
    read-only none 128B -> ld.global.nc.L2::128B.b32
    read-only none 256B -> ld.global.nc.L2::128B.b32
    read-only first none -> ld.global.nc.L1::evict_first.b32
    read-only first 64B -> ld.global.nc.L1::evict_first.L2::64B.b32
    read-only first 128B -> ld.global.nc.L1::evict_first.L2::128B.b32
    read-only first 256B -> ld.global.nc.L1::evict_first.L2::128B.b32
    ");
}

#[test]
fn test_plan_json() {
    let req = LoadRequest::of::<u64>()
        .count(4)
        .aligned(16)
        .access(AccessMode::ReadOnly)
        .eviction(EvictionPolicy::First)
        .prefetch(PrefetchDistance::B256);
    let plan: LoadPlan = plan_load(HardwareTier::Sm75.features(), &req).unwrap();

    assert_eq!(
        serde_json::to_value(&plan).unwrap(),
        serde_json::json!({
            "form": {
                "kind": "global",
                "access": "read-only",
                "eviction": "first",
                "prefetch": "128B"
            },
            "chunk_bytes": 16,
            "chunk_count": 2,
            "mnemonic": "ld.global.nc.L1::evict_first.L2::128B.b128"
        })
    );
}

// ==================== Property Tests ====================

proptest! {
    #[test]
    fn prop_valid_array_plans_cover_every_byte(
        size_exp in 0u32..5,
        count in 1usize..64,
        align_exp in 0u32..5,
        tier_idx in 0usize..4,
    ) {
        let size = 1usize << size_exp;
        let align = 1usize << align_exp;
        let req = LoadRequest::new(size, size.min(16))
            .count(count)
            .aligned(align)
            .access(AccessMode::ReadOnly);
        let features = HardwareTier::DESCENDING[tier_idx].features();

        match plan_load(features, &req) {
            Ok(plan) => {
                prop_assert_eq!(plan.chunk_bytes * plan.chunk_count, size * count);
                prop_assert_eq!(plan.emitted(), plan.chunk_count);
            }
            Err(PlanError::AlignmentTooSmall { .. }) => prop_assert!(align < size.min(16)),
            Err(PlanError::NotMultiple { .. }) => prop_assert!(size * count % align != 0),
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }
}
