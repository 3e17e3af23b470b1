//! Pull-based chain replication over line-delimited JSON.
//!
//! Each TCP connection carries one request line and one response line.

pub mod client;
pub mod error;
pub mod message;
pub mod server;

pub use client::{PeerClient, sync_chain};
pub use server::{ChainService, serve};
