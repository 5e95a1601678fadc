//! # FastChain
//!
//! A single-node, append-only ledger secured by proof-of-work.
//!
//! Value moves between plain string addresses. Nothing tracks per-address
//! state directly: balances are derived by replaying every block from
//! genesis, and a spendable balance additionally subtracts transfers still
//! waiting in the pending pool.
//!
//! ## Layout
//! - `core/`: blocks, transactions, Merkle commitments, sealing, balance
//!   replay, validation and the `Ledger` engine
//! - `node/`: the thread-safe `MinerNode` with its process-wide mining lock
//! - `network/`: JSON packages over TCP and the subscriber broadcast
//! - `config/`: defaults, TOML file and `FASTCHAIN_*` environment overrides
//! - `utils/`: hashing, timestamps and encodings
//! - `cli/`: command-line parsing for the binary
//!
//! ## Example
//! ```
//! use fastchain::{Difficulty, Ledger};
//!
//! let mut ledger = Ledger::new(Difficulty::new("0").unwrap(), 50).unwrap();
//! ledger.add_balance("alice", 100).unwrap();
//! ledger.add_transaction("alice", "bob", 40).unwrap();
//! assert_eq!(ledger.get_balance("alice"), 60);
//!
//! let pending = ledger.get_pending_transactions().to_vec();
//! let block = ledger.mine_with_pending(pending, "miner").unwrap();
//! assert!(ledger.accept_external_block(block));
//! assert_eq!(ledger.get_balance("miner"), 50);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod node;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, GLOBAL_CONFIG};
pub use core::{
    Amount, BalanceLedger, Block, BlockBalances, ChainValidator, Difficulty, Ledger, MerkleProof,
    MerkleTree, ProofOfWork, Transaction, DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD,
    UNITS_PER_COIN,
};
pub use error::{LedgerError, Result};
pub use network::{send_request, Package, Server};
pub use node::{MinerNode, NodeEvent};
pub use utils::{current_timestamp, sha256_digest, sha256_hex};
