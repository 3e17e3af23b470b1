use serde::Serialize;

use crate::blockchain::SharedChain;
use crate::clock::Clock;
use crate::uint256::Percent;

/// Shared state handed to every HTTP handler.
pub struct AppState {
    pub chain: SharedChain,
    pub clock: Clock,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub height: i64,
    pub blocks: u64,
    pub tip_hash: Option<String>,
    pub target: Option<String>,
    /// Tip difficulty relative to genesis difficulty, in percent.
    pub difficulty_pct: Option<Percent>,
    pub tip_work: Option<String>,
    pub chain_work: String,
    pub last_interval_secs: Option<i64>,
    pub block_interval_secs: u64,
    pub retarget_period: u64,
    pub clock: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
