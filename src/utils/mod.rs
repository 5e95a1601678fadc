//! Utility functions and helpers
//!
//! Hashing, timestamps and the two encodings used by the ledger.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, sha256_digest, sha256_hex, sha256_hex_parts};

pub use serialization::{canonical_json, deserialize, from_json, serialize};
