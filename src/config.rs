use std::env;
use std::time::Duration;

/// Node settings from the environment (`.env` honoured) plus the optional
/// peer address given as the first CLI argument. Bad values fall back to
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub sync_addr: String,
    pub peer: Option<String>,
    pub peer_timeout: Duration,
    pub clock_tick: Duration,
    pub mine: bool,
}

impl NodeConfig {
    pub fn from_env(args: impl IntoIterator<Item = String>) -> Self {
        Self::from_lookup(|key| env::var(key).ok(), args)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        args: impl IntoIterator<Item = String>,
    ) -> Self {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port: u16 = lookup("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let sync_addr = lookup("SYNC_ADDR").unwrap_or_else(|| "127.0.0.1:8333".to_string());
        let peer = args
            .into_iter()
            .next()
            .or_else(|| lookup("PEER"))
            .filter(|p| !p.trim().is_empty());
        let peer_timeout_ms: u64 = lookup("PEER_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(10_000);
        let clock_tick_ms: u64 = lookup("CLOCK_TICK_MS")
            .and_then(|v| v.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(1000);
        let mine = lookup("MINE")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Self {
            host,
            port,
            sync_addr,
            peer,
            peer_timeout: Duration::from_millis(peer_timeout_ms),
            clock_tick: Duration::from_millis(clock_tick_ms),
            mine,
        }
    }
}
