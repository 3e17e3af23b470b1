//! Process-wide "latest wall-clock time" cell.
//!
//! A ticker task refreshes it periodically and the miner polls it between
//! nonce attempts. It is independent of the chain lock so checking the time
//! never waits on a chain mutation.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Clock {
    micros: Arc<AtomicI64>,
}

impl Clock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(time: DateTime<Utc>) -> Self {
        Self {
            micros: Arc::new(AtomicI64::new(time.timestamp_micros())),
        }
    }

    /// Latest published time, microsecond precision.
    pub fn latest(&self) -> DateTime<Utc> {
        let micros = self.micros.load(Ordering::Relaxed);
        DateTime::from_timestamp_micros(micros).unwrap_or_default()
    }

    pub fn set(&self, time: DateTime<Utc>) {
        self.micros.store(time.timestamp_micros(), Ordering::Relaxed);
    }

    pub fn tick(&self) {
        self.set(Utc::now());
    }

    /// Refresh the cell every `period` on the current tokio runtime.
    pub fn spawn_ticker(&self, period: Duration) -> JoinHandle<()> {
        let clock = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                clock.tick();
            }
        })
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
