//! Core ledger functionality
//!
//! Blocks, transactions, Merkle commitments, proof-of-work sealing, balance
//! replay, chain validation and the `Ledger` engine that ties them together.

pub mod balance;
pub mod block;
pub mod ledger;
pub mod merkle;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;
pub mod validation;

pub use balance::BalanceLedger;
pub use block::{genesis_previous_hash, Block, BlockBalances, BLOCK_VERSION};
pub use ledger::Ledger;
pub use merkle::{MerkleProof, MerkleTree, ProofElement};
pub use monetary::{Amount, COIN_DECIMALS, DEFAULT_MINING_REWARD, UNITS_PER_COIN};
pub use proof_of_work::{Difficulty, ProofOfWork, DEFAULT_DIFFICULTY};
pub use transaction::Transaction;
pub use validation::ChainValidator;
