//! Shared, thread-safe access to a single ledger
//!
//! `MinerNode` is what the server and the CLI hold. Reads go through a
//! read lock, mutations through the write lock, and anything that appends
//! or replaces blocks is serialized by one process-wide mining lock.

pub mod miner;

pub use miner::{MinerNode, NodeEvent};
