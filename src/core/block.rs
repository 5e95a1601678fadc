use crate::core::{Amount, Difficulty, MerkleProof, MerkleTree, ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::{canonical_json, current_timestamp, deserialize, serialize};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format version stamped on every block
pub const BLOCK_VERSION: u32 = 1;

/// Previous-hash value carried by the genesis block
pub fn genesis_previous_hash() -> String {
    "0".repeat(64)
}

/// Credits a block records, either an explicit snapshot or a miner reward
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BlockBalances {
    /// Caller-computed address -> amount mapping
    Snapshot { credits: BTreeMap<String, Amount> },
    /// Single entry paying the miner of the block
    Reward { miner: String, amount: Amount },
}

impl BlockBalances {
    pub fn empty() -> Self {
        BlockBalances::Snapshot {
            credits: BTreeMap::new(),
        }
    }

    pub fn snapshot(credits: BTreeMap<String, Amount>) -> Self {
        BlockBalances::Snapshot { credits }
    }

    pub fn reward(miner: &str, amount: Amount) -> Self {
        BlockBalances::Reward {
            miner: miner.to_string(),
            amount,
        }
    }

    /// Address -> amount view regardless of variant
    pub fn credits(&self) -> BTreeMap<String, Amount> {
        match self {
            BlockBalances::Snapshot { credits } => credits.clone(),
            BlockBalances::Reward { miner, amount } => {
                BTreeMap::from([(miner.clone(), *amount)])
            }
        }
    }

    /// Amount credited to one address by this block
    pub fn credit_for(&self, address: &str) -> Amount {
        match self {
            BlockBalances::Snapshot { credits } => credits.get(address).copied().unwrap_or(0),
            BlockBalances::Reward { miner, amount } if miner == address => *amount,
            BlockBalances::Reward { .. } => 0,
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Block {
    index: u64,
    timestamp: i64,
    transactions: Vec<Transaction>,
    balances: BlockBalances,
    previous_hash: String,
    merkle_root: String,
    nonce: u64,
    hash: String,
    version: u32,
}

// Every field except nonce and hash; this is what the seal commits to
#[derive(Serialize)]
struct SealingPayload<'a> {
    index: u64,
    timestamp: i64,
    transactions: &'a [Transaction],
    balances: &'a BlockBalances,
    previous_hash: &'a str,
    merkle_root: &'a str,
    version: u32,
}

impl Block {
    /// Assemble and seal a block in one step
    pub fn new_block(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        balances: BlockBalances,
        difficulty: &Difficulty,
    ) -> Result<Block> {
        Self::unsealed(index, previous_hash, transactions, balances)?.seal(difficulty)
    }

    /// Assemble a block stamped with the current time, without a seal yet
    pub fn unsealed(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        balances: BlockBalances,
    ) -> Result<Block> {
        Self::unsealed_with_timestamp(
            index,
            current_timestamp()?,
            previous_hash,
            transactions,
            balances,
        )
    }

    pub fn unsealed_with_timestamp(
        index: u64,
        timestamp: i64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        balances: BlockBalances,
    ) -> Result<Block> {
        if index == 0 {
            return Err(LedgerError::InvalidBlock(
                "Block index is 1-based".to_string(),
            ));
        }

        // The root goes in before sealing so the hash commits to it
        let merkle_root = MerkleTree::calculate_merkle_root(&transactions)?;

        Ok(Block {
            index,
            timestamp,
            transactions,
            balances,
            previous_hash,
            merkle_root,
            nonce: 0,
            hash: String::new(),
            version: BLOCK_VERSION,
        })
    }

    /// Run proof-of-work and stamp the resulting nonce and hash
    pub fn seal(mut self, difficulty: &Difficulty) -> Result<Block> {
        info!(
            "Starting proof-of-work for block {} with {} transactions (difficulty: {difficulty})",
            self.index,
            self.transactions.len()
        );
        let pow = ProofOfWork::new_proof_of_work(&self, difficulty)?;
        let (nonce, hash) = pow.run();
        self.nonce = nonce;
        self.hash = hash;
        info!(
            "Proof-of-work completed for block {}: {} (nonce: {nonce})",
            self.index, self.hash
        );
        Ok(self)
    }

    pub fn generate_genesis_block(difficulty: &Difficulty) -> Result<Block> {
        Block::new_block(
            1,
            genesis_previous_hash(),
            Vec::new(),
            BlockBalances::empty(),
            difficulty,
        )
    }

    /// Sorted-key encoding of everything except nonce and hash
    pub fn sealing_payload(&self) -> Result<Vec<u8>> {
        canonical_json(&SealingPayload {
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            balances: &self.balances,
            previous_hash: &self.previous_hash,
            merkle_root: &self.merkle_root,
            version: self.version,
        })
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_balances(&self) -> &BlockBalances {
        &self.balances
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_merkle_root(&self) -> &str {
        self.merkle_root.as_str()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_version(&self) -> u32 {
        self.version
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1 && self.previous_hash == genesis_previous_hash()
    }

    /// Verify that the block's Merkle root matches its transactions
    pub fn verify_merkle_root(&self) -> Result<bool> {
        MerkleTree::verify_transactions(&self.transactions, &self.merkle_root)
    }

    /// Generate a Merkle proof for a transaction in this block
    pub fn generate_merkle_proof(&self, transaction_index: usize) -> Result<MerkleProof> {
        MerkleTree::new(&self.transactions)?.generate_proof(transaction_index)
    }

    /// Verify a Merkle proof against this block's Merkle root
    pub fn verify_merkle_proof(&self, proof: &MerkleProof) -> bool {
        proof.merkle_root == self.merkle_root && MerkleTree::verify_proof(proof)
    }
}
