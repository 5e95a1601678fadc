//! Testnet fixtures for ledger testing
//!
//! Low-difficulty ledgers, funded ledgers, forks and block tampering helpers
//! shared by the unit tests.

pub mod test_utils;

pub use test_utils::*;
