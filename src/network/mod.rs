//! Node protocol over TCP
//!
//! JSON-encoded `Package` messages streamed over plain TCP connections. A
//! client sends one request and reads one reply; a miner that subscribes
//! keeps its connection open and receives `NewBlock` and `ChainUpdate`
//! pushes whenever the node commits a change.

pub mod server;

pub use server::{send_request, Package, Server};
