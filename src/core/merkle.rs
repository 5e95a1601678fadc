use crate::core::Transaction;
use crate::error::{LedgerError, Result};
use crate::utils::{sha256_hex, sha256_hex_parts};
use serde::{Deserialize, Serialize};

/// Merkle tree over a block's ordered transaction list
///
/// Every level is kept so inclusion proofs can be produced without
/// rehashing. Hashes are lowercase hex strings; an inner node is the SHA-256
/// of its two children's hex strings concatenated. A level with an odd count
/// pairs its last hash with itself.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    // levels[0] holds the leaves, the last level holds the root
    levels: Vec<Vec<String>>,
}

/// Merkle proof for transaction verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Hash of the transaction being proven
    pub transaction_hash: String,
    /// Merkle root hash
    pub merkle_root: String,
    /// Proof path (sibling hashes and directions), leaf level first
    pub proof_path: Vec<ProofElement>,
    /// Index of the transaction in the block
    pub transaction_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofElement {
    /// Sibling hash
    pub hash: String,
    /// Direction: true if sibling is on the right, false if on the left
    pub is_right: bool,
}

impl MerkleTree {
    /// Create a new Merkle tree from a list of transactions
    pub fn new(transactions: &[Transaction]) -> Result<Self> {
        let leaf_hashes = transactions
            .iter()
            .map(Transaction::hash)
            .collect::<Result<Vec<String>>>()?;
        Ok(Self::from_hashes(&leaf_hashes))
    }

    /// Create a Merkle tree from leaf hashes
    pub fn from_hashes(hashes: &[String]) -> Self {
        let mut levels = vec![hashes.to_vec()];

        while let Some(current) = levels.last() {
            if current.len() <= 1 {
                break;
            }
            let next_level = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    Self::hash_pair(left, right)
                })
                .collect();
            levels.push(next_level);
        }

        MerkleTree { levels }
    }

    /// Digest committing to the empty transaction list
    pub fn empty_root() -> String {
        sha256_hex(b"")
    }

    /// Get the Merkle root hash
    pub fn get_root_hash(&self) -> String {
        self.levels
            .last()
            .and_then(|level| level.first())
            .cloned()
            .unwrap_or_else(Self::empty_root)
    }

    /// Generate a Merkle proof for a transaction at the given index
    pub fn generate_proof(&self, transaction_index: usize) -> Result<MerkleProof> {
        let out_of_bounds = || {
            LedgerError::InvalidBlock(format!(
                "Transaction index {transaction_index} out of bounds ({} transactions)",
                self.leaf_count()
            ))
        };
        let transaction_hash = self
            .levels
            .first()
            .and_then(|leaves| leaves.get(transaction_index))
            .cloned()
            .ok_or_else(out_of_bounds)?;

        let inner = self.levels.split_last().map_or(&[][..], |(_, rest)| rest);
        let mut proof_path = Vec::new();
        let mut index = transaction_index;
        for level in inner {
            let is_right = index % 2 == 0;
            let sibling = if is_right {
                level.get(index + 1).or_else(|| level.get(index))
            } else {
                level.get(index - 1)
            };
            proof_path.push(ProofElement {
                hash: sibling.cloned().ok_or_else(out_of_bounds)?,
                is_right,
            });
            index /= 2;
        }

        Ok(MerkleProof {
            transaction_hash,
            merkle_root: self.get_root_hash(),
            proof_path,
            transaction_index,
        })
    }

    /// Verify a Merkle proof
    pub fn verify_proof(proof: &MerkleProof) -> bool {
        let computed = proof
            .proof_path
            .iter()
            .fold(proof.transaction_hash.clone(), |current, element| {
                if element.is_right {
                    Self::hash_pair(&current, &element.hash)
                } else {
                    Self::hash_pair(&element.hash, &current)
                }
            });

        computed == proof.merkle_root
    }

    fn hash_pair(left: &str, right: &str) -> String {
        sha256_hex_parts(&[left.as_bytes(), right.as_bytes()])
    }

    /// Get the number of leaves in the tree
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.leaf_count() == 0
    }
}

/// Utility functions for Merkle tree operations
impl MerkleTree {
    /// Commit to an ordered transaction list without keeping the tree around
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Result<String> {
        Ok(Self::new(transactions)?.get_root_hash())
    }

    /// Verify that a list of transactions produces the expected Merkle root
    pub fn verify_transactions(transactions: &[Transaction], expected_root: &str) -> Result<bool> {
        Ok(Self::calculate_merkle_root(transactions)? == expected_root)
    }
}
