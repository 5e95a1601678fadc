//! Error handling for the ledger
//!
//! Rejected input and failed validation are reported here; structural checks
//! on blocks and chains return plain booleans instead.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error types for ledger, node and protocol operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Input refused before any state was touched
    Rejected(String),
    /// Sender cannot cover the transfer with its spendable balance
    InsufficientFunds { required: u64, available: u64 },
    /// Block failed structural or consensus validation
    InvalidBlock(String),
    /// Mining attempt could not produce an acceptable block
    Mining(String),
    /// Configuration errors
    Config(String),
    /// Network communication errors
    Network(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// A shared-state lock was poisoned
    Lock(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Rejected(msg) => write!(f, "Rejected: {msg}"),
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            LedgerError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            LedgerError::Mining(msg) => write!(f, "Mining error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Network(msg) => write!(f, "Network error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::Lock(msg) => write!(f, "Lock error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl LedgerError {
    /// True for errors caused by the caller's input rather than node state
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::Rejected(_) | LedgerError::InsufficientFunds { .. }
        )
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}
