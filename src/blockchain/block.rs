use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::ZERO_HASH;
use super::hash::double_hash;
use crate::uint256::{self, FixedUint256};

/// The hashed part of a block.
///
/// Serializing this struct with `serde_json` *is* the canonical encoding:
/// field order and formatting below are consensus-critical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockHeader {
    #[serde(rename = "Nonce")]
    pub nonce: u64,
    #[serde(rename = "ParentBlockHash")]
    pub parent_hash: FixedUint256,
    #[serde(rename = "Time", with = "iso8601")]
    pub time: DateTime<Utc>,
    #[serde(rename = "Target")]
    pub target: FixedUint256,
}

impl BlockHeader {
    /// Header with nonce 0. The time is truncated to microseconds so it
    /// survives a serialization round trip unchanged.
    pub fn new(parent_hash: FixedUint256, time: DateTime<Utc>, target: FixedUint256) -> Self {
        Self {
            nonce: 0,
            parent_hash,
            time: time.trunc_subsecs(6),
            target,
        }
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("header serialization is infallible")
    }

    pub fn block_hash(&self) -> FixedUint256 {
        double_hash(&self.canonical_bytes())
    }
}

/// Expected number of hashes needed to find a block at `target`.
///
/// # Panics
///
/// Panics on a zero target; consensus never produces one.
pub fn work(target: FixedUint256) -> FixedUint256 {
    FixedUint256::MAX / target
}

/// A header plus the fields derived from its position in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    header: BlockHeader,
    height: u64,
    work: FixedUint256,
    chain_work: FixedUint256,
    hash: FixedUint256,
}

impl Block {
    /// Derive height, work, chain-work and hash for `header` on top of
    /// `parent` (`None` for genesis).
    pub fn new(header: BlockHeader, parent: Option<&Block>) -> Self {
        let work = work(header.target);
        let (height, chain_work) = match parent {
            Some(p) => (p.height + 1, p.chain_work + work),
            None => (0, work),
        };
        let hash = header.block_hash();
        Self {
            header,
            height,
            work,
            chain_work,
            hash,
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn work(&self) -> FixedUint256 {
        self.work
    }

    pub fn chain_work(&self) -> FixedUint256 {
        self.chain_work
    }

    pub fn hash(&self) -> FixedUint256 {
        self.hash
    }

    pub fn target(&self) -> FixedUint256 {
        self.header.target
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.header.time
    }

    pub fn parent_hash(&self) -> FixedUint256 {
        self.header.parent_hash
    }

    pub fn is_genesis(&self) -> bool {
        self.header.parent_hash == ZERO_HASH
    }

    /// Whether the hash satisfies the proof-of-work target (inclusive).
    pub fn meets_target(&self) -> bool {
        self.hash <= self.header.target
    }
}

/// A block as it travels between nodes: header plus the sender's claimed
/// derived fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireBlock {
    #[serde(rename = "Header")]
    pub header: BlockHeader,
    #[serde(rename = "BlockHeight")]
    pub height: u64,
    #[serde(rename = "ChainWork", with = "uint256::decimal")]
    pub chain_work: FixedUint256,
    #[serde(rename = "BlockHash")]
    pub hash: FixedUint256,
}

impl From<&Block> for WireBlock {
    fn from(block: &Block) -> Self {
        Self {
            header: block.header.clone(),
            height: block.height,
            chain_work: block.chain_work,
            hash: block.hash,
        }
    }
}

/// ISO-8601 UTC with exactly six fractional digits.
mod iso8601 {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let time = NaiveDateTime::parse_from_str(&s, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)?;
        // the parser is lenient about fractional digits
        if time.format(FORMAT).to_string() != s {
            return Err(serde::de::Error::custom(format!("non-canonical time {s:?}")));
        }
        Ok(time)
    }
}
