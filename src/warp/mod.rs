//! Warp-synchronous shuffles
//!
//! `shfl.sync` in its four modes. Every lane of a warp passes a 32-bit value
//! and reads the value of one source lane. The source lane is computed from
//! the lane's own id, the index/offset operand `b` and the packed
//! clamp/segment operand `c`:
//!
//! ```text
//! segmask = c[12:8]                cval = c[4:0]
//! max     = (lane & segmask) | (cval & !segmask)
//! min     = lane & segmask
//!
//! idx   j = min | (b & !segmask)   valid if j <= max
//! up    j = lane - b               valid if j >= max
//! down  j = lane + b               valid if j <= max
//! bfly  j = lane ^ b               valid if j <= max
//! ```
//!
//! A lane whose source is out of range reads its own value and gets a false
//! predicate.

use std::fmt;

use bytemuck::Pod;
use serde::Serialize;

use crate::movement::Emitter;

pub const WARP_SIZE: u32 = 32;

/// All 32 lanes
pub const FULL_MASK: u32 = 0xffff_ffff;

/// Bits of the `c` operand that may be set: segment mask at 12..8, clamp at 4..0
pub const CLAMP_SEGMASK_BITS: u32 = 0b1_1111_0001_1111;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    Idx,
    Up,
    Down,
    Bfly,
}

impl ShuffleMode {
    pub const ALL: [ShuffleMode; 4] = [
        ShuffleMode::Idx,
        ShuffleMode::Up,
        ShuffleMode::Down,
        ShuffleMode::Bfly,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ShuffleMode::Idx => "idx",
            ShuffleMode::Up => "up",
            ShuffleMode::Down => "down",
            ShuffleMode::Bfly => "bfly",
        }
    }
}

impl fmt::Display for ShuffleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One shuffle instruction as handed to the emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ShuffleOp {
    pub mode: ShuffleMode,
    pub lane_idx_offset: u32,
    pub clamp_segmask: u32,
    pub lane_mask: u32,
}

impl ShuffleOp {
    pub fn mnemonic(&self) -> String {
        format!("shfl.sync.{}.b32", self.mode)
    }
}

impl fmt::Display for ShuffleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} b={}, c={:#x}, mask={:#010x}",
            self.mnemonic(),
            self.lane_idx_offset,
            self.clamp_segmask,
            self.lane_mask
        )
    }
}

/// `c` operand for shuffling within sub-warps of `width` lanes
///
/// `width` must be a power of two between 1 and 32.
pub const fn clamp_segmask(mode: ShuffleMode, width: u32) -> u32 {
    let segmask = (WARP_SIZE - width) << 8;
    match mode {
        ShuffleMode::Up => segmask,
        ShuffleMode::Idx | ShuffleMode::Down | ShuffleMode::Bfly => segmask | (WARP_SIZE - 1),
    }
}

/// Source lane and in-range predicate for `lane`
pub const fn source_lane(mode: ShuffleMode, lane: u32, b: u32, c: u32) -> (u32, bool) {
    let lane = lane & 0x1f;
    let b = b & 0x1f;
    let cval = c & 0x1f;
    let segmask = (c >> 8) & 0x1f;
    let max_lane = (lane & segmask) | (cval & !segmask);
    let min_lane = lane & segmask;

    let (j, valid) = match mode {
        ShuffleMode::Idx => {
            let j = min_lane | (b & !segmask);
            (j as i64, j <= max_lane)
        }
        ShuffleMode::Up => {
            let j = lane as i64 - b as i64;
            (j, j >= max_lane as i64)
        }
        ShuffleMode::Down => {
            let j = (lane + b) as i64;
            (j, j <= max_lane as i64)
        }
        ShuffleMode::Bfly => {
            let j = lane ^ b;
            (j as i64, j <= max_lane)
        }
    };

    if valid { (j as u32, true) } else { (lane, false) }
}

/// Result of one shuffle across a full warp, lane by lane
pub fn shuffle_warp(mode: ShuffleMode, values: &[u32; 32], b: u32, c: u32) -> [(u32, bool); 32] {
    std::array::from_fn(|lane| {
        let (src, valid) = source_lane(mode, lane as u32, b, c);
        (values[src as usize], valid)
    })
}

/// Shuffle entry points for the lane the emitter runs on
#[derive(Debug, Clone, Copy)]
pub struct Warp<'e, Em> {
    emitter: &'e Em,
}

impl<'e, Em: Emitter> Warp<'e, Em> {
    pub fn new(emitter: &'e Em) -> Self {
        Self { emitter }
    }

    pub fn lane_id(&self) -> u32 {
        self.emitter.lane_id()
    }

    pub fn active_mask(&self) -> u32 {
        self.emitter.active_mask()
    }

    pub fn shfl_idx_sync<T: Pod>(&self, data: T, src_lane: u32, clamp_segmask: u32, lane_mask: u32) -> T {
        self.shuffle(ShuffleMode::Idx, data, src_lane, clamp_segmask, lane_mask).0
    }

    pub fn shfl_idx_sync_pred<T: Pod>(
        &self,
        data: T,
        src_lane: u32,
        clamp_segmask: u32,
        lane_mask: u32,
    ) -> (T, bool) {
        self.shuffle(ShuffleMode::Idx, data, src_lane, clamp_segmask, lane_mask)
    }

    pub fn shfl_up_sync<T: Pod>(&self, data: T, delta: u32, clamp_segmask: u32, lane_mask: u32) -> T {
        self.shuffle(ShuffleMode::Up, data, delta, clamp_segmask, lane_mask).0
    }

    pub fn shfl_up_sync_pred<T: Pod>(
        &self,
        data: T,
        delta: u32,
        clamp_segmask: u32,
        lane_mask: u32,
    ) -> (T, bool) {
        self.shuffle(ShuffleMode::Up, data, delta, clamp_segmask, lane_mask)
    }

    pub fn shfl_down_sync<T: Pod>(&self, data: T, delta: u32, clamp_segmask: u32, lane_mask: u32) -> T {
        self.shuffle(ShuffleMode::Down, data, delta, clamp_segmask, lane_mask).0
    }

    pub fn shfl_down_sync_pred<T: Pod>(
        &self,
        data: T,
        delta: u32,
        clamp_segmask: u32,
        lane_mask: u32,
    ) -> (T, bool) {
        self.shuffle(ShuffleMode::Down, data, delta, clamp_segmask, lane_mask)
    }

    pub fn shfl_bfly_sync<T: Pod>(&self, data: T, lane_xor: u32, clamp_segmask: u32, lane_mask: u32) -> T {
        self.shuffle(ShuffleMode::Bfly, data, lane_xor, clamp_segmask, lane_mask).0
    }

    pub fn shfl_bfly_sync_pred<T: Pod>(
        &self,
        data: T,
        lane_xor: u32,
        clamp_segmask: u32,
        lane_mask: u32,
    ) -> (T, bool) {
        self.shuffle(ShuffleMode::Bfly, data, lane_xor, clamp_segmask, lane_mask)
    }

    fn shuffle<T: Pod>(
        &self,
        mode: ShuffleMode,
        data: T,
        lane_idx_offset: u32,
        clamp_segmask: u32,
        lane_mask: u32,
    ) -> (T, bool) {
        const { assert!(size_of::<T>() == 4, "shfl.sync only accepts 4-byte data types") };

        debug_assert!(
            lane_idx_offset < WARP_SIZE,
            "the lane index or offset must be less than the warp size"
        );
        debug_assert!(
            clamp_segmask | CLAMP_SEGMASK_BITS == CLAMP_SEGMASK_BITS,
            "clamp value + segmentation mask must fit the 13-bit pattern 0b1_1111_0001_1111"
        );
        debug_assert!(
            lane_mask & self.emitter.active_mask() == lane_mask,
            "lane mask must be a subset of the active mask"
        );
        debug_assert!(
            {
                let (src, _) = source_lane(mode, self.emitter.lane_id(), lane_idx_offset, clamp_segmask);
                lane_mask & (1 << src) != 0
            },
            "the destination lane must be a member of the lane mask"
        );

        let op = ShuffleOp {
            mode,
            lane_idx_offset,
            clamp_segmask,
            lane_mask,
        };
        let bits: u32 = bytemuck::pod_read_unaligned(bytemuck::bytes_of(&data));
        let (out, valid) = self.emitter.shuffle(op, bits);
        (bytemuck::pod_read_unaligned(&out.to_ne_bytes()), valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: u32 = 0x1f;

    #[test]
    fn test_idx_broadcast() {
        for lane in 0..32 {
            assert_eq!(source_lane(ShuffleMode::Idx, lane, 5, FULL), (5, true));
        }
    }

    #[test]
    fn test_up_boundary() {
        assert_eq!(source_lane(ShuffleMode::Up, 0, 1, 0), (0, false));
        assert_eq!(source_lane(ShuffleMode::Up, 3, 1, 0), (2, true));
        assert_eq!(source_lane(ShuffleMode::Up, 3, 4, 0), (3, false));
    }

    #[test]
    fn test_down_boundary() {
        assert_eq!(source_lane(ShuffleMode::Down, 31, 1, FULL), (31, false));
        assert_eq!(source_lane(ShuffleMode::Down, 30, 1, FULL), (31, true));
    }

    #[test]
    fn test_bfly_pairs() {
        assert_eq!(source_lane(ShuffleMode::Bfly, 4, 1, FULL), (5, true));
        assert_eq!(source_lane(ShuffleMode::Bfly, 5, 1, FULL), (4, true));
    }

    #[test]
    fn test_sub_warp_segments() {
        // 8-lane segments: idx 2 reads lane 2 of the caller's own segment
        let c = clamp_segmask(ShuffleMode::Idx, 8);
        assert_eq!(c, 0x181f);
        assert_eq!(source_lane(ShuffleMode::Idx, 13, 2, c), (10, true));

        // down does not cross into the next segment
        let c = clamp_segmask(ShuffleMode::Down, 8);
        assert_eq!(source_lane(ShuffleMode::Down, 6, 1, c), (7, true));
        assert_eq!(source_lane(ShuffleMode::Down, 7, 1, c), (7, false));

        // up does not cross into the previous segment
        let c = clamp_segmask(ShuffleMode::Up, 8);
        assert_eq!(c, 0x1800);
        assert_eq!(source_lane(ShuffleMode::Up, 8, 1, c), (8, false));
        assert_eq!(source_lane(ShuffleMode::Up, 9, 1, c), (8, true));
    }

    #[test]
    fn test_clamp_masks_fit_pattern() {
        for mode in ShuffleMode::ALL {
            for width in [1, 2, 4, 8, 16, 32] {
                let c = clamp_segmask(mode, width);
                assert_eq!(c | CLAMP_SEGMASK_BITS, CLAMP_SEGMASK_BITS);
            }
        }
    }

    #[test]
    fn test_shuffle_warp_rotation() {
        let values: [u32; 32] = std::array::from_fn(|i| i as u32 * 10);
        let out = shuffle_warp(ShuffleMode::Down, &values, 1, FULL);
        assert_eq!(out[0], (10, true));
        assert_eq!(out[31], (310, false));
    }

    #[test]
    fn test_mnemonic() {
        let op = ShuffleOp {
            mode: ShuffleMode::Bfly,
            lane_idx_offset: 1,
            clamp_segmask: FULL,
            lane_mask: FULL_MASK,
        };
        assert_eq!(op.mnemonic(), "shfl.sync.bfly.b32");
    }
}
