//! Validation of blocks received from a peer.
//!
//! Every field a sender claims is re-derived locally exactly as the miner
//! would derive it:
//! 1. the payload parses as a [`WireBlock`]
//! 2. the parent is the zero hash (genesis) or a stored block
//! 3. height, target and chain-work match the local derivation
//! 4. the header hashes to the claimed hash
//! 5. the hash meets the target
//! 6. the block extends the local tip
//!
//! A rejected block is dropped; the store is only touched on success.

use log::debug;
use thiserror::Error;

use super::difficulty::compute_target;
use super::model::{ChainStore, ChainView, StoreError};
use super::{Block, BlockHeader, WireBlock, ZERO_HASH};
use crate::uint256::FixedUint256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed block: {0}")]
    Malformed(String),
    #[error("unknown parent {0:?}")]
    UnknownParent(FixedUint256),
    #[error("height mismatch: claimed {claimed}, derived {derived}")]
    HeightMismatch { claimed: u64, derived: u64 },
    #[error("target mismatch: claimed {claimed:?}, derived {derived:?}")]
    TargetMismatch {
        claimed: FixedUint256,
        derived: FixedUint256,
    },
    #[error("chain-work mismatch: claimed {claimed}, derived {derived}")]
    ChainWorkMismatch {
        claimed: FixedUint256,
        derived: FixedUint256,
    },
    #[error("hash mismatch: claimed {claimed:?}, derived {derived:?}")]
    HashMismatch {
        claimed: FixedUint256,
        derived: FixedUint256,
    },
    #[error("proof of work not met: hash {hash:?} above target {target:?}")]
    ProofOfWorkNotMet {
        hash: FixedUint256,
        target: FixedUint256,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parse, check and append a serialized block. The caller must hold the
/// chain's write lock so the retarget inputs cannot change mid-check.
pub fn validate_and_store(store: &mut ChainStore, payload: &str) -> Result<Block, ValidationError> {
    let wire: WireBlock =
        serde_json::from_str(payload).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    let block = validate(&*store, &wire)?;
    let block = store.append(block)?.clone();
    debug!(
        "VALIDATOR - accepted block #{} hash={}",
        block.height(),
        block.hash().to_hex()
    );
    Ok(block)
}

/// Rebuild the block `wire` describes and compare it against every claim.
/// Does not check whether the block extends the tip; `append` does.
pub fn validate<C: ChainView + ?Sized>(chain: &C, wire: &WireBlock) -> Result<Block, ValidationError> {
    let claimed = &wire.header;

    let parent = if claimed.parent_hash == ZERO_HASH {
        None
    } else {
        Some(
            chain
                .get_by_hash(&claimed.parent_hash)
                .ok_or(ValidationError::UnknownParent(claimed.parent_hash))?,
        )
    };

    let derived_height = parent.map_or(0, |p| p.height() + 1);
    if wire.height != derived_height {
        return Err(ValidationError::HeightMismatch {
            claimed: wire.height,
            derived: derived_height,
        });
    }

    let derived_target = compute_target(chain, derived_height)
        .ok_or(ValidationError::UnknownParent(claimed.parent_hash))?;
    if claimed.target != derived_target {
        return Err(ValidationError::TargetMismatch {
            claimed: claimed.target,
            derived: derived_target,
        });
    }

    let header = BlockHeader {
        nonce: claimed.nonce,
        parent_hash: claimed.parent_hash,
        time: claimed.time,
        target: derived_target,
    };
    let candidate = Block::new(header, parent);

    if wire.chain_work != candidate.chain_work() {
        return Err(ValidationError::ChainWorkMismatch {
            claimed: wire.chain_work,
            derived: candidate.chain_work(),
        });
    }
    if wire.hash != candidate.hash() {
        return Err(ValidationError::HashMismatch {
            claimed: wire.hash,
            derived: candidate.hash(),
        });
    }
    if !candidate.meets_target() {
        return Err(ValidationError::ProofOfWorkNotMet {
            hash: candidate.hash(),
            target: candidate.target(),
        });
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::blockchain::miner::tests::{UNEVEN_GAPS, mine_with_gaps};
    use crate::blockchain::{BOOTSTRAP_HEIGHT, MAX_TARGET, Miner, SharedChain};
    use crate::clock::Clock;

    /// Mine `count` blocks and return them in height order.
    fn mined_chain(count: usize) -> Vec<Block> {
        let chain: SharedChain = ChainStore::shared();
        let clock = Clock::starting_at(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        let miner = Miner::new(chain, clock);
        (0..count).map(|_| miner.mine_next().unwrap()).collect()
    }

    fn json(block: &Block) -> String {
        serde_json::to_string(&WireBlock::from(block)).unwrap()
    }

    fn tampered(block: &Block, edit: impl FnOnce(&mut WireBlock)) -> String {
        let mut wire = WireBlock::from(block);
        edit(&mut wire);
        serde_json::to_string(&wire).unwrap()
    }

    #[test]
    fn accepts_mined_blocks_in_order() {
        let blocks = mined_chain(3);
        let mut store = ChainStore::new();
        for block in &blocks {
            let accepted = validate_and_store(&mut store, &json(block)).unwrap();
            assert_eq!(&accepted, block);
        }
        assert_eq!(store.tip(), blocks.last());
    }

    #[test]
    fn replays_blocks_past_the_first_retarget() {
        let (_, blocks) = mine_with_gaps(&UNEVEN_GAPS);
        assert!(blocks.len() > 10);
        let retargeted = &blocks[BOOTSTRAP_HEIGHT as usize + 1];
        assert_ne!(retargeted.target(), MAX_TARGET);

        let mut store = ChainStore::new();
        for block in &blocks {
            let accepted = validate_and_store(&mut store, &json(block)).unwrap();
            assert_eq!(&accepted, block);
        }
        assert_eq!(store.next_height(), blocks.len() as u64);
    }

    #[test]
    fn rejects_a_retargeted_block_claiming_the_old_target() {
        let (_, blocks) = mine_with_gaps(&UNEVEN_GAPS);
        let height = BOOTSTRAP_HEIGHT as usize + 1;
        let mut store = ChainStore::new();
        for block in &blocks[..height] {
            validate_and_store(&mut store, &json(block)).unwrap();
        }

        let derived = blocks[height].target();
        let stale_target = tampered(&blocks[height], |w| w.header.target = MAX_TARGET);
        assert_eq!(
            validate_and_store(&mut store, &stale_target),
            Err(ValidationError::TargetMismatch {
                claimed: MAX_TARGET,
                derived
            })
        );
        assert_eq!(store.next_height(), height as u64);
        validate_and_store(&mut store, &json(&blocks[height])).unwrap();
    }

    #[test]
    fn rejects_garbage() {
        let mut store = ChainStore::new();
        for payload in ["", "not json", "{\"Header\":{}}", "[1,2,3]"] {
            assert!(matches!(
                validate_and_store(&mut store, payload),
                Err(ValidationError::Malformed(_))
            ));
        }
        assert_eq!(store.tip_height(), -1);
    }

    #[test]
    fn rejects_unknown_parent() {
        let blocks = mined_chain(2);
        let mut store = ChainStore::new();
        assert_eq!(
            validate_and_store(&mut store, &json(&blocks[1])),
            Err(ValidationError::UnknownParent(blocks[0].hash()))
        );
    }

    #[test]
    fn rejects_each_tampered_field() {
        let blocks = mined_chain(2);
        let mut store = ChainStore::new();
        validate_and_store(&mut store, &json(&blocks[0])).unwrap();
        let b1 = &blocks[1];

        let bumped_nonce = tampered(b1, |w| w.header.nonce += 1);
        assert!(matches!(
            validate_and_store(&mut store, &bumped_nonce),
            Err(ValidationError::HashMismatch { .. })
        ));

        let wrong_height = tampered(b1, |w| w.height = 5);
        assert_eq!(
            validate_and_store(&mut store, &wrong_height),
            Err(ValidationError::HeightMismatch {
                claimed: 5,
                derived: 1
            })
        );

        let wrong_target = tampered(b1, |w| w.header.target = MAX_TARGET / 2);
        assert!(matches!(
            validate_and_store(&mut store, &wrong_target),
            Err(ValidationError::TargetMismatch { .. })
        ));

        let wrong_work = tampered(b1, |w| w.chain_work = w.chain_work + FixedUint256::ONE);
        assert!(matches!(
            validate_and_store(&mut store, &wrong_work),
            Err(ValidationError::ChainWorkMismatch { .. })
        ));

        let wrong_hash = tampered(b1, |w| w.hash = FixedUint256::ONE);
        assert!(matches!(
            validate_and_store(&mut store, &wrong_hash),
            Err(ValidationError::HashMismatch { .. })
        ));

        assert_eq!(store.next_height(), 1);
        validate_and_store(&mut store, &json(b1)).unwrap();
    }

    #[test]
    fn genesis_must_claim_height_zero() {
        let blocks = mined_chain(1);
        let mut store = ChainStore::new();
        let payload = tampered(&blocks[0], |w| w.height = 1);
        assert_eq!(
            validate_and_store(&mut store, &payload),
            Err(ValidationError::HeightMismatch {
                claimed: 1,
                derived: 0
            })
        );
    }

    #[test]
    fn rejects_hash_above_target() {
        // an unmined header whose claims are otherwise consistent
        let header = BlockHeader::new(
            ZERO_HASH,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            MAX_TARGET,
        );
        let mut candidate = Block::new(header.clone(), None);
        let mut nonce = 0;
        while candidate.meets_target() {
            nonce += 1;
            let mut next = header.clone();
            next.nonce = nonce;
            candidate = Block::new(next, None);
        }

        let mut store = ChainStore::new();
        assert_eq!(
            validate_and_store(&mut store, &json(&candidate)),
            Err(ValidationError::ProofOfWorkNotMet {
                hash: candidate.hash(),
                target: MAX_TARGET
            })
        );
        assert_eq!(store.tip_height(), -1);
    }

    #[test]
    fn rejects_duplicates_and_forks() {
        let blocks = mined_chain(2);
        let mut store = ChainStore::new();
        validate_and_store(&mut store, &json(&blocks[0])).unwrap();
        validate_and_store(&mut store, &json(&blocks[1])).unwrap();

        assert_eq!(
            validate_and_store(&mut store, &json(&blocks[1])),
            Err(ValidationError::Store(StoreError::DuplicateHash(blocks[1].hash())))
        );

        // a second, independently mined genesis cannot replace ours
        let other = Miner::new(
            ChainStore::shared(),
            Clock::starting_at(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
        )
        .mine_next()
        .unwrap();
        assert_eq!(
            validate_and_store(&mut store, &json(&other)),
            Err(ValidationError::Store(StoreError::NonContiguousHeight {
                expected: 2,
                actual: 0
            }))
        );
    }
}
