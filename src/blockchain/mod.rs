pub mod block;
pub mod difficulty;
pub mod hash;
pub mod miner;
pub mod model;
pub mod validation;

pub use block::{Block, BlockHeader, WireBlock};
pub use miner::Miner;
pub use model::{ChainStore, ChainView, SharedChain};
pub use validation::validate_and_store;

use crate::uint256::FixedUint256;

/// Easiest allowed target, `FixedUint256::MAX / 65536`. Used for genesis.
pub const MAX_TARGET: FixedUint256 =
    FixedUint256::from_limbs([u64::MAX, u64::MAX, u64::MAX, 0x0000_FFFF_FFFF_FFFF]);

/// Parent hash carried by the genesis block.
pub const ZERO_HASH: FixedUint256 = FixedUint256::ZERO;

/// Desired seconds between blocks.
pub const BLOCK_INTERVAL_SECS: u64 = 60;

/// Span of history the retarget looks back over.
pub const ADJUSTMENT_INTERVAL_SECS: u64 = 86_400;

/// Divides the block interval; 1 on the live network.
pub const TEST_SCALING_FACTOR: u64 = 1;

/// Blocks per retarget lookback (1440).
pub const RETARGET_PERIOD: u64 = ADJUSTMENT_INTERVAL_SECS / BLOCK_INTERVAL_SECS;

/// Heights `1..=BOOTSTRAP_HEIGHT` inherit the parent target unchanged.
pub const BOOTSTRAP_HEIGHT: u64 = 6;

/// Blocks sampled for median-time-past.
pub const MEDIAN_TIME_WINDOW: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_target_is_max_over_65536() {
        assert_eq!(MAX_TARGET, FixedUint256::MAX / 65_536);
        assert_eq!(RETARGET_PERIOD, 1440);
    }
}
