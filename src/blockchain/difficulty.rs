//! Difficulty retargeting.
//!
//! - Genesis uses [`MAX_TARGET`].
//! - Heights `1..=BOOTSTRAP_HEIGHT` copy the parent target.
//! - Later heights compare the work done between two median-time-past blocks
//!   roughly one [`RETARGET_PERIOD`] apart against the time it took, with the
//!   observed timespan clamped to `[expected / 2, expected * 2]`.
//!
//! Every step is integer arithmetic; truncation is part of consensus.

use log::debug;

use super::model::ChainView;
use super::{
    BLOCK_INTERVAL_SECS, BOOTSTRAP_HEIGHT, Block, MAX_TARGET, MEDIAN_TIME_WINDOW,
    RETARGET_PERIOD, TEST_SCALING_FACTOR,
};
use crate::uint256::FixedUint256;

/// Target required of the block at `height`.
///
/// Returns `None` if the block at `height - 1` (or the retarget ancestor) is
/// not in `chain`.
pub fn compute_target<C: ChainView + ?Sized>(chain: &C, height: u64) -> Option<FixedUint256> {
    if height == 0 {
        return Some(MAX_TARGET);
    }

    let parent = chain.get_by_height(height - 1)?;
    if height <= BOOTSTRAP_HEIGHT {
        return Some(parent.target());
    }

    let ancestor_index = parent.height().saturating_sub(RETARGET_PERIOD);
    let mut ancestor = chain.get_by_height(ancestor_index)?;
    if ancestor.height() >= 2 {
        ancestor = chain.median_time_block(ancestor, MEDIAN_TIME_WINDOW);
    }
    let last = chain.median_time_block(parent, MEDIAN_TIME_WINDOW);

    let target = compute_new_target(ancestor, last);
    if let Ok(pct) = parent.target().div_percent(target) {
        debug!(
            "RETARGET height={} window={}..{} difficulty={}% of parent",
            height,
            ancestor.height(),
            last.height(),
            pct
        );
    }
    Some(target)
}

/// Target implied by the work done between `first` and `second` and the time
/// it took.
pub fn compute_new_target(first: &Block, second: &Block) -> FixedUint256 {
    let effective_interval = BLOCK_INTERVAL_SECS / TEST_SCALING_FACTOR;
    let work_delta = second.chain_work() - first.chain_work();
    let height_delta = second.height().saturating_sub(first.height());

    let expected_seconds =
        i64::try_from(height_delta.saturating_mul(effective_interval)).unwrap_or(i64::MAX);
    let mut actual_seconds = (second.time() - first.time())
        .num_seconds()
        .clamp(expected_seconds / 2, expected_seconds.saturating_mul(2));
    if actual_seconds == 0 {
        actual_seconds = 1;
    }

    // clamp keeps actual_seconds positive
    let new_work = work_delta * effective_interval / actual_seconds as u64;
    // no work between the samples falls back to the easiest target
    FixedUint256::MAX / new_work.max(FixedUint256::ONE)
}
