mod chain;
mod health;
pub mod models;
mod stats;

use actix_web::web::{self, ServiceConfig};

pub use models::AppState;

/// Read-only status endpoints; the sync protocol has its own listener.
pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::get_tip)
            .service(chain::get_block)
            .service(stats::get_stats),
    );
}
