use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use super::Block;
use crate::uint256::FixedUint256;

/// Handle to the process-wide chain, shared by the miner, the validator and
/// the network handlers.
pub type SharedChain = Arc<RwLock<ChainStore>>;

/// Index integrity errors. These are the only checks the store performs on
/// its own; consensus rules live in the validator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("block at height {actual} does not extend the tip (next height is {expected})")]
    NonContiguousHeight { expected: u64, actual: u64 },
    #[error("block {0:?} is already stored")]
    DuplicateHash(FixedUint256),
}

/// Read-only lookups over a chain. Retargeting and validation only need this,
/// so an alternative backing store can stand in for [`ChainStore`].
pub trait ChainView {
    fn tip(&self) -> Option<&Block>;
    fn get_by_height(&self, height: u64) -> Option<&Block>;
    fn get_by_hash(&self, hash: &FixedUint256) -> Option<&Block>;

    /// Median-time-past: `from` and up to `window - 1` ancestors sorted by
    /// timestamp, returning the element at `window / 2`. Near genesis fewer
    /// blocks are available and the last one is used if the index overshoots.
    fn median_time_block<'a>(&'a self, from: &'a Block, window: usize) -> &'a Block {
        let window = window.max(1);
        let mut sample = Vec::with_capacity(window);
        let mut cursor = Some(from);
        while let Some(block) = cursor {
            if sample.len() == window {
                break;
            }
            sample.push(block);
            cursor = if block.is_genesis() {
                None
            } else {
                self.get_by_hash(&block.parent_hash())
            };
        }
        sample.sort_by_key(|b| b.time());
        let index = (window / 2).min(sample.len() - 1);
        sample[index]
    }
}

/// In-memory, append-only chain: block-by-hash, hash-by-height and the tip.
#[derive(Debug, Default)]
pub struct ChainStore {
    blocks: HashMap<FixedUint256, Block>,
    heights: Vec<FixedUint256>,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedChain {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Height of the tip, `-1` when empty (the `getblockcount` convention).
    pub fn tip_height(&self) -> i64 {
        self.heights.len() as i64 - 1
    }

    pub fn next_height(&self) -> u64 {
        self.heights.len() as u64
    }

    /// Insert into both indexes. The caller is responsible for parent linkage
    /// and consensus validity.
    pub fn append(&mut self, block: Block) -> Result<&Block, StoreError> {
        let hash = block.hash();
        if self.blocks.contains_key(&hash) {
            return Err(StoreError::DuplicateHash(hash));
        }
        if block.height() != self.next_height() {
            return Err(StoreError::NonContiguousHeight {
                expected: self.next_height(),
                actual: block.height(),
            });
        }
        self.heights.push(hash);
        Ok(self.blocks.entry(hash).or_insert(block))
    }

    /// Blocks from genesis to the tip.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.heights.iter().filter_map(|hash| self.blocks.get(hash))
    }
}

impl ChainView for ChainStore {
    fn tip(&self) -> Option<&Block> {
        self.heights.last().and_then(|hash| self.blocks.get(hash))
    }

    fn get_by_height(&self, height: u64) -> Option<&Block> {
        let hash = self.heights.get(usize::try_from(height).ok()?)?;
        self.blocks.get(hash)
    }

    fn get_by_hash(&self, hash: &FixedUint256) -> Option<&Block> {
        self.blocks.get(hash)
    }
}
