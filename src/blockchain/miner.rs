use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use thiserror::Error;

use super::difficulty::compute_target;
use super::model::{ChainView, SharedChain};
use super::{Block, BlockHeader, ZERO_HASH};
use crate::clock::Clock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MinerError {
    #[error("mining cancelled")]
    Cancelled,
    /// The tip moved away from the parent we were mining on.
    #[error("stale candidate at height {height}")]
    Stale { height: u64 },
}

/// Stops a running [`Miner`] at its next nonce attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Proof-of-work search on top of the shared chain.
pub struct Miner {
    chain: SharedChain,
    clock: Clock,
    cancel: CancelHandle,
}

impl Miner {
    pub fn new(chain: SharedChain, clock: Clock) -> Self {
        Self {
            chain,
            clock,
            cancel: CancelHandle::default(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Mine on the current tip until cancelled.
    pub fn run(&self) {
        info!("MINER - started");
        loop {
            match self.mine_next() {
                Ok(_) => {}
                Err(MinerError::Stale { height }) => {
                    debug!("MINER - tip moved, dropped candidate for height {height}");
                }
                Err(MinerError::Cancelled) => {
                    info!("MINER - stopped");
                    return;
                }
            }
        }
    }

    pub fn mine_next(&self) -> Result<Block, MinerError> {
        let tip = {
            let chain = self.chain.read().expect("chain lock poisoned");
            chain.tip().cloned()
        };
        self.mine(tip.as_ref())
    }

    /// Find a block on top of `parent` (`None` mines genesis) and append it.
    ///
    /// The chain lock is not held during the search; if the tip is no longer
    /// `parent` when a solution is found the block is discarded.
    pub fn mine(&self, parent: Option<&Block>) -> Result<Block, MinerError> {
        let height = parent.map_or(0, |p| p.height() + 1);
        let parent_hash = parent.map_or(ZERO_HASH, Block::hash);

        let target = {
            let chain = self.chain.read().expect("chain lock poisoned");
            if chain.tip().map(Block::hash) != parent.map(Block::hash) {
                return Err(MinerError::Stale { height });
            }
            compute_target(&*chain, height).ok_or(MinerError::Stale { height })?
        };

        let header = BlockHeader::new(parent_hash, self.clock.latest(), target);
        let header = self.search(header)?;
        let block = Block::new(header, parent);

        let mut chain = self.chain.write().expect("chain lock poisoned");
        if chain.tip().map(Block::hash) != parent.map(Block::hash) {
            return Err(MinerError::Stale { height });
        }
        let block = chain
            .append(block)
            .map_err(|_| MinerError::Stale { height })?
            .clone();

        info!(
            "MINER - sealed block #{} (hash={}, nonce={})",
            block.height(),
            block.hash().to_hex(),
            block.header().nonce
        );
        Ok(block)
    }

    /// Increment the nonce until the header hashes at or below its target,
    /// picking up a newer clock reading whenever one has been published.
    fn search(&self, mut header: BlockHeader) -> Result<BlockHeader, MinerError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(MinerError::Cancelled);
            }
            let now = self.clock.latest();
            if now != header.time {
                header.time = now;
            }
            if header.block_hash() <= header.target {
                return Ok(header);
            }
            header.nonce = header.nonce.wrapping_add(1);
        }
    }
}
