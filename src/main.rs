mod api;
mod blockchain;
mod clock;
mod config;
mod network;
mod uint256;

use std::env;
use std::sync::Arc;
use std::thread;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{error, info, warn};
use tokio::net::TcpListener;

use api::AppState;
use blockchain::{ChainStore, Miner};
use clock::Clock;
use config::NodeConfig;
use network::{ChainService, PeerClient};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = NodeConfig::from_env(env::args().skip(1));
    let chain = ChainStore::shared();
    let clock = Clock::new();
    let _ticker = clock.spawn_ticker(config.clock_tick);

    if let Some(peer) = &config.peer {
        let client = PeerClient::new(peer.clone()).with_timeout(config.peer_timeout);
        match network::sync_chain(&client, &chain).await {
            Ok(report) => info!(
                "synced from {peer}: remote height {}, {} accepted, {} rejected",
                report.remote_height, report.accepted, report.rejected
            ),
            Err(e) => error!("sync from {peer} failed: {e}"),
        }
    }

    let listener = TcpListener::bind(&config.sync_addr).await?;
    tokio::spawn(network::serve(
        listener,
        Arc::new(ChainService::new(chain.clone())),
    ));

    let miner = Miner::new(chain.clone(), clock.clone());
    let cancel = miner.cancel_handle();
    let miner_thread = if config.mine {
        Some(thread::spawn(move || miner.run()))
    } else {
        info!("mining disabled");
        None
    };

    info!(
        "⛓️ node up: sync on {}, status API at http://{}:{}",
        config.sync_addr, config.host, config.port
    );

    let state = web::Data::new(AppState {
        chain: chain.clone(),
        clock,
    });
    let result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    cancel.cancel();
    if let Some(handle) = miner_thread {
        if handle.join().is_err() {
            warn!("miner thread panicked");
        }
    }
    result
}
