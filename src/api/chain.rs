use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, ErrorResponse};
use crate::blockchain::{ChainView, WireBlock};

/// Every block from genesis to the tip.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let chain = state.chain.read().expect("chain lock poisoned");
    let blocks: Vec<WireBlock> = chain.iter().map(WireBlock::from).collect();
    HttpResponse::Ok().json(blocks)
}

/// Current tip in the sync wire format.
#[get("/chain/tip/")]
pub async fn get_tip(state: web::Data<AppState>) -> impl Responder {
    let chain = state.chain.read().expect("chain lock poisoned");
    match chain.tip() {
        Some(block) => HttpResponse::Ok().json(WireBlock::from(block)),
        None => HttpResponse::NotFound().json(ErrorResponse {
            error: "chain is empty".into(),
        }),
    }
}

#[get("/blocks/{height}/")]
pub async fn get_block(state: web::Data<AppState>, path: web::Path<(u64,)>) -> impl Responder {
    let height = path.into_inner().0;
    let chain = state.chain.read().expect("chain lock poisoned");
    match chain.get_by_height(height) {
        Some(block) => HttpResponse::Ok().json(WireBlock::from(block)),
        None => HttpResponse::NotFound().json(ErrorResponse {
            error: format!("no block at height {height}"),
        }),
    }
}
