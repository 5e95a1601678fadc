use crate::core::Block;
use crate::error::{LedgerError, Result};
use crate::utils::sha256_hex_parts;
use log::debug;
use std::fmt;

/// Difficulty used when nothing else is configured: five leading hex zeros
pub const DEFAULT_DIFFICULTY: &str = "00000";

// A SHA-256 hex digest is 64 characters long
const HASH_HEX_LEN: usize = 64;

/// Fixed leading-character pattern a block hash must start with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difficulty {
    prefix: String,
}

impl Difficulty {
    pub fn new(prefix: &str) -> Result<Difficulty> {
        if prefix.is_empty() || prefix.len() > HASH_HEX_LEN {
            return Err(LedgerError::Config(format!(
                "Difficulty prefix must be 1 to {HASH_HEX_LEN} characters, got {}",
                prefix.len()
            )));
        }
        // Anything outside lowercase hex could never match a digest
        if !prefix
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(LedgerError::Config(format!(
                "Difficulty prefix must be lowercase hex, got '{prefix}'"
            )));
        }
        Ok(Difficulty {
            prefix: prefix.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_str()
    }

    pub fn is_satisfied_by(&self, hash: &str) -> bool {
        hash.starts_with(self.prefix.as_str())
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty {
            prefix: DEFAULT_DIFFICULTY.to_string(),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)
    }
}

/// Brute-force nonce search over a block's sealing payload
pub struct ProofOfWork<'a> {
    payload: Vec<u8>,
    difficulty: &'a Difficulty,
}

impl<'a> ProofOfWork<'a> {
    pub fn new_proof_of_work(block: &Block, difficulty: &'a Difficulty) -> Result<Self> {
        Ok(ProofOfWork {
            payload: block.sealing_payload()?,
            difficulty,
        })
    }

    /// Validate proof-of-work for a sealed block
    ///
    /// The stored hash must both recompute from the block's content and
    /// nonce, and start with the difficulty prefix.
    pub fn validate(block: &Block, difficulty: &Difficulty) -> bool {
        if !difficulty.is_satisfied_by(block.get_hash()) {
            return false;
        }
        match ProofOfWork::new_proof_of_work(block, difficulty) {
            Ok(pow) => pow.hash_with_nonce(block.get_nonce()) == block.get_hash(),
            Err(_) => false,
        }
    }

    fn hash_with_nonce(&self, nonce: u64) -> String {
        sha256_hex_parts(&[self.payload.as_slice(), nonce.to_string().as_bytes()])
    }

    /// Search nonce = 0, 1, 2, ... until the hash meets the difficulty.
    ///
    /// There is no upper bound; the search only ends on success.
    pub fn run(&self) -> (u64, String) {
        let mut nonce: u64 = 0;
        loop {
            let hash = self.hash_with_nonce(nonce);
            if self.difficulty.is_satisfied_by(&hash) {
                debug!("Found nonce {nonce} for difficulty {}", self.difficulty);
                return (nonce, hash);
            }
            nonce += 1;
        }
    }
}
