use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};
use crate::blockchain::{BLOCK_INTERVAL_SECS, ChainView, MAX_TARGET, RETARGET_PERIOD};
use crate::uint256::FixedUint256;

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    let chain = state.chain.read().expect("chain lock poisoned");
    let tip = chain.tip();

    let last_interval_secs = tip.and_then(|t| {
        let parent = chain.get_by_hash(&t.parent_hash())?;
        Some((t.time() - parent.time()).num_seconds())
    });

    HttpResponse::Ok().json(StatsResponse {
        height: chain.tip_height(),
        blocks: chain.next_height(),
        tip_hash: tip.map(|t| t.hash().to_hex()),
        target: tip.map(|t| t.target().to_hex()),
        difficulty_pct: tip.and_then(|t| MAX_TARGET.div_percent(t.target()).ok()),
        tip_work: tip.map(|t| t.work().to_string()),
        chain_work: tip.map_or(FixedUint256::ZERO, |t| t.chain_work()).to_string(),
        last_interval_secs,
        block_interval_secs: BLOCK_INTERVAL_SECS,
        retarget_period: RETARGET_PERIOD,
        clock: state.clock.latest().to_rfc3339(),
    })
}
