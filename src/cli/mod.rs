//! Command-line interface
//!
//! This module contains the CLI commands and argument parsing
//! for the ledger node and its client.

pub mod commands;

pub use commands::{CoinAmountArg, Command, Opt};
