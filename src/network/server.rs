use std::io;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use super::message::{Request, Response};
use crate::blockchain::{ChainView, SharedChain, WireBlock};

/// Answers one parsed request. Transport-agnostic so the listener can be
/// replaced without touching chain logic.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: Request) -> Response;

    /// Parse and answer a raw request line.
    fn handle_line(&self, line: &str) -> Response {
        match Request::parse(line) {
            Ok(request) => self.handle(request),
            Err(err) => err.into(),
        }
    }
}

/// Read-only view of the local chain served to peers.
pub struct ChainService {
    chain: SharedChain,
}

impl ChainService {
    pub fn new(chain: SharedChain) -> Self {
        Self { chain }
    }
}

impl RequestHandler for ChainService {
    fn handle(&self, request: Request) -> Response {
        let chain = self.chain.read().expect("chain lock poisoned");
        match request {
            Request::GetBlockCount => Response::BlockCount(chain.tip_height()),
            Request::GetBlockHash { blockheight } => match chain.get_by_height(blockheight) {
                Some(block) => Response::BlockHash(block.hash()),
                None => Response::error(format!("No block at height {blockheight}")),
            },
            Request::GetBlock { blockhash } => match chain.get_by_hash(&blockhash) {
                Some(block) => Response::Block(WireBlock::from(block)),
                None => Response::error(format!("Unknown block {}", blockhash.to_hex())),
            },
        }
    }
}

/// Longest request line read from a peer. Anything past it is dropped and
/// the truncated line fails to parse.
pub const MAX_REQUEST_BYTES: u64 = 4096;

/// Accept connections forever, one task per connection.
pub async fn serve<H: RequestHandler>(listener: TcpListener, handler: Arc<H>) {
    if let Ok(addr) = listener.local_addr() {
        info!("SYNC - listening on {addr}");
    }
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("SYNC - accept failed: {e}");
                continue;
            }
        };
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, handler.as_ref()).await {
                warn!("SYNC - connection from {peer} failed: {e}");
            }
        });
    }
}

async fn handle_connection<S, H>(stream: S, handler: &H) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: RequestHandler,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut line = String::new();
    BufReader::new(reader.take(MAX_REQUEST_BYTES))
        .read_line(&mut line)
        .await?;

    let response = handler.handle_line(line.trim());
    if let Response::Error(err) = &response {
        debug!("SYNC - request {:?} failed: {}", line.trim(), err.error_message);
    }

    let mut payload = serde_json::to_string(&response)?;
    payload.push('\n');
    writer.write_all(payload.as_bytes()).await?;
    writer.shutdown().await
}
