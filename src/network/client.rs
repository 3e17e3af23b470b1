use std::io;
use std::time::Duration;

use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::error::{SyncError, SyncResult};
use super::message::{ErrorMessage, Request, Response};
use crate::blockchain::{SharedChain, validate_and_store};
use crate::uint256::FixedUint256;

/// Deadline for connecting, and separately for one request/response exchange.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);

/// Client side of the sync protocol; dials once per request.
#[derive(Debug, Clone)]
pub struct PeerClient {
    addr: String,
    timeout: Duration,
}

impl PeerClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_PEER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and return the raw response line. An `errorMessage`
    /// reply becomes [`SyncError::Remote`]; a peer that does not answer in
    /// time becomes an `Io` error of kind `TimedOut`.
    pub async fn call(&self, request: &Request) -> SyncResult<String> {
        let connect = timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .unwrap_or_else(|_| Err(self.timed_out("connecting")));
        let mut stream = connect.map_err(|source| SyncError::Dial {
            addr: self.addr.clone(),
            source,
        })?;

        let mut payload = serde_json::to_string(request)?;
        payload.push('\n');

        let mut line = String::new();
        let exchange = async {
            stream.write_all(payload.as_bytes()).await?;
            BufReader::new(&mut stream).read_line(&mut line).await
        };
        timeout(self.timeout, exchange)
            .await
            .unwrap_or_else(|_| Err(self.timed_out(request.command())))?;
        let line = line.trim_end();
        if line.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} closed without replying to {}", self.addr, request.command()),
            )
            .into());
        }
        if let Ok(err) = serde_json::from_str::<ErrorMessage>(line) {
            return Err(SyncError::Remote(err.error_message));
        }
        Ok(line.to_string())
    }

    pub async fn block_count(&self) -> SyncResult<i64> {
        let request = Request::GetBlockCount;
        let line = self.call(&request).await?;
        match serde_json::from_str::<Response>(&line)? {
            Response::BlockCount(count) => Ok(count),
            _ => Err(unexpected(&request, line)),
        }
    }

    pub async fn block_hash(&self, height: u64) -> SyncResult<FixedUint256> {
        let request = Request::GetBlockHash {
            blockheight: height,
        };
        let line = self.call(&request).await?;
        match serde_json::from_str::<Response>(&line)? {
            Response::BlockHash(hash) => Ok(hash),
            _ => Err(unexpected(&request, line)),
        }
    }

    /// The serialized block, left unparsed for the validator.
    pub async fn block(&self, hash: FixedUint256) -> SyncResult<String> {
        self.call(&Request::GetBlock { blockhash: hash }).await
    }

    fn timed_out(&self, what: &str) -> io::Error {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{} did not answer {} within {:?}", self.addr, what, self.timeout),
        )
    }
}

fn unexpected(request: &Request, response: String) -> SyncError {
    SyncError::UnexpectedResponse {
        command: request.command(),
        response,
    }
}

/// Outcome of one [`sync_chain`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub remote_height: i64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Replicate the peer's chain into `chain`, height by height.
///
/// A block that fails validation is logged and skipped; the run carries on
/// with the next height. Network errors abort the run.
pub async fn sync_chain(client: &PeerClient, chain: &SharedChain) -> SyncResult<SyncReport> {
    let remote_height = client.block_count().await?;
    info!("SYNC - peer {} reports height {}", client.addr(), remote_height);

    let mut report = SyncReport {
        remote_height,
        ..SyncReport::default()
    };
    for height in 0..=remote_height {
        let height = height as u64;
        let hash = client.block_hash(height).await?;
        let payload = client.block(hash).await?;

        let outcome = {
            let mut store = chain.write().expect("chain lock poisoned");
            validate_and_store(&mut store, &payload)
        };
        match outcome {
            Ok(block) => {
                report.accepted += 1;
                info!("SYNC - block #{} {} accepted", height, block.hash().to_hex());
            }
            Err(e) => {
                report.rejected += 1;
                warn!("SYNC - block #{} {} rejected: {}", height, hash.to_hex(), e);
            }
        }
    }

    info!(
        "SYNC - done with {}: {} accepted, {} rejected",
        client.addr(),
        report.accepted,
        report.rejected
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use tokio::net::TcpListener;

    use super::*;
    use crate::blockchain::miner::tests::{UNEVEN_GAPS, mine_with_gaps};
    use crate::blockchain::{ChainStore, ChainView, Miner};
    use crate::clock::Clock;
    use crate::network::server::{ChainService, RequestHandler, serve};

    async fn spawn_node(chain: SharedChain) -> PeerClient {
        spawn_handler(ChainService::new(chain)).await
    }

    async fn spawn_handler<H: RequestHandler>(handler: H) -> PeerClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::new(handler)));
        PeerClient::new(addr.to_string())
    }

    fn mined(count: usize) -> SharedChain {
        let chain = ChainStore::shared();
        let miner = Miner::new(
            chain.clone(),
            Clock::starting_at(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()),
        );
        for _ in 0..count {
            miner.mine_next().unwrap();
        }
        chain
    }

    #[tokio::test]
    async fn replicates_a_remote_chain() {
        let remote = mined(3);
        let client = spawn_node(remote.clone()).await;

        let local = ChainStore::shared();
        let report = sync_chain(&client, &local).await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                remote_height: 2,
                accepted: 3,
                rejected: 0
            }
        );

        let remote = remote.read().unwrap();
        let local = local.read().unwrap();
        assert_eq!(local.tip(), remote.tip());
        assert!(local.iter().eq(remote.iter()));
    }

    #[tokio::test]
    async fn replicates_past_the_first_retarget() {
        let (remote, blocks) = mine_with_gaps(&UNEVEN_GAPS);
        let client = spawn_node(remote).await;

        let local = ChainStore::shared();
        let report = sync_chain(&client, &local).await.unwrap();
        assert_eq!(report.accepted, blocks.len() as u64);
        assert_eq!(report.rejected, 0);

        let local = local.read().unwrap();
        assert!(local.iter().eq(blocks.iter()));
    }

    #[tokio::test]
    async fn resync_rejects_known_blocks_and_continues() {
        let remote = mined(2);
        let client = spawn_node(remote).await;
        let local = ChainStore::shared();

        sync_chain(&client, &local).await.unwrap();
        let again = sync_chain(&client, &local).await.unwrap();
        assert_eq!(again.accepted, 0);
        assert_eq!(again.rejected, 2);
        assert_eq!(local.read().unwrap().next_height(), 2);
    }

    #[tokio::test]
    async fn empty_remote_is_a_no_op() {
        let client = spawn_node(ChainStore::shared()).await;
        let local = ChainStore::shared();
        let report = sync_chain(&client, &local).await.unwrap();
        assert_eq!(report.remote_height, -1);
        assert_eq!(report.accepted + report.rejected, 0);
    }

    /// Serves a real chain but corrupts the nonce of one block.
    struct Tampering {
        inner: ChainService,
        height: u64,
    }

    impl RequestHandler for Tampering {
        fn handle(&self, request: Request) -> Response {
            match self.inner.handle(request) {
                Response::Block(mut wire) if wire.height == self.height => {
                    wire.header.nonce += 1;
                    Response::Block(wire)
                }
                other => other,
            }
        }
    }

    #[tokio::test]
    async fn invalid_block_is_skipped_not_fatal() {
        let remote = mined(3);
        let client = spawn_handler(Tampering {
            inner: ChainService::new(remote),
            height: 1,
        })
        .await;

        let local = ChainStore::shared();
        let report = sync_chain(&client, &local).await.unwrap();
        // height 1 is corrupt, so height 2 has an unknown parent
        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected, 2);
        assert_eq!(local.read().unwrap().tip_height(), 0);
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // accept and hold every connection without ever replying
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = PeerClient::new(addr.to_string()).with_timeout(Duration::from_millis(200));
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            sync_chain(&client, &ChainStore::shared()),
        )
        .await
        .expect("sync must give up on its own");
        match outcome {
            Err(SyncError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn remote_errors_and_dial_failures_surface() {
        let client = spawn_node(ChainStore::shared()).await;
        assert!(matches!(
            client.block_hash(5).await,
            Err(SyncError::Remote(msg)) if msg == "No block at height 5"
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let unreachable = PeerClient::new(addr.to_string());
        assert!(matches!(
            sync_chain(&unreachable, &ChainStore::shared()).await,
            Err(SyncError::Dial { .. })
        ));
    }
}
