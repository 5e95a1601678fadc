use crate::core::balance::{outgoing_by_sender, BalanceLedger};
use crate::core::{Block, Difficulty, ProofOfWork};
use crate::error::{LedgerError, Result};
use log::warn;

/// Structural and consensus checks for blocks and whole chains
pub struct ChainValidator<'a> {
    difficulty: &'a Difficulty,
}

impl<'a> ChainValidator<'a> {
    pub fn new(difficulty: &'a Difficulty) -> Self {
        ChainValidator { difficulty }
    }

    /// Check `block` as the next block after `prefix`, explaining any failure.
    ///
    /// Affordability is judged against the balances replayed over `prefix`,
    /// i.e. the state before the block. A sender's transfers inside the block
    /// are summed before comparing.
    pub fn check_successor(&self, prefix: &[Block], block: &Block) -> Result<()> {
        let tip = prefix.last().ok_or_else(|| {
            LedgerError::InvalidBlock("Chain has no block to extend".to_string())
        })?;

        self.check_structure(tip, block)?;

        for tx in block.get_transactions() {
            tx.check_well_formed()
                .map_err(|e| LedgerError::InvalidBlock(format!("Bad transaction: {e}")))?;
        }

        let balances = BalanceLedger::confirmed_only(prefix);
        for (sender, outgoing) in outgoing_by_sender(block.get_transactions()) {
            let available = balances.confirmed_balance(sender);
            if outgoing > available as u128 {
                return Err(LedgerError::InvalidBlock(format!(
                    "Sender {sender} spends {outgoing} but only has {available}"
                )));
            }
        }

        Ok(())
    }

    /// A chain may only start from an empty, sealed genesis block: no
    /// transfers and no credits.
    pub fn check_genesis(&self, block: &Block) -> Result<()> {
        if !block.is_genesis() {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} is not a genesis block",
                block.get_index()
            )));
        }
        if !block.get_transactions().is_empty() || !block.get_balances().credits().is_empty() {
            return Err(LedgerError::InvalidBlock(
                "Genesis block must not carry transactions or credits".to_string(),
            ));
        }
        if !ProofOfWork::validate(block, self.difficulty) {
            return Err(LedgerError::InvalidBlock(format!(
                "Genesis block fails proof-of-work for difficulty {}",
                self.difficulty
            )));
        }
        if !block.verify_merkle_root()? {
            return Err(LedgerError::InvalidBlock(
                "Genesis Merkle root does not match its transactions".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_valid_successor(&self, prefix: &[Block], block: &Block) -> bool {
        match self.check_successor(prefix, block) {
            Ok(()) => true,
            Err(e) => {
                warn!("Block {} rejected: {e}", block.get_index());
                false
            }
        }
    }

    /// Position of the first block that breaks linkage, proof-of-work or its
    /// Merkle commitment. Genesis is trusted as-is.
    pub fn first_invalid_block(&self, chain: &[Block]) -> Option<usize> {
        if chain.is_empty() {
            return Some(0);
        }
        chain
            .windows(2)
            .position(|pair| self.check_structure(&pair[0], &pair[1]).is_err())
            .map(|position| position + 1)
    }

    pub fn is_chain_valid(&self, chain: &[Block]) -> bool {
        match self.first_invalid_block(chain) {
            None => true,
            Some(position) => {
                warn!("Chain invalid at position {position}");
                false
            }
        }
    }

    fn check_structure(&self, previous: &Block, block: &Block) -> Result<()> {
        if block.get_previous_hash() != previous.get_hash() {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} does not link to {}",
                block.get_index(),
                previous.get_hash()
            )));
        }
        if block.get_index() != previous.get_index() + 1 {
            return Err(LedgerError::InvalidBlock(format!(
                "Block index {} does not follow {}",
                block.get_index(),
                previous.get_index()
            )));
        }
        if !ProofOfWork::validate(block, self.difficulty) {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} fails proof-of-work for difficulty {}",
                block.get_index(),
                self.difficulty
            )));
        }
        if !block.verify_merkle_root()? {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} Merkle root does not match its transactions",
                block.get_index()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BlockBalances, Transaction};
    use std::collections::BTreeMap;

    fn easy() -> Difficulty {
        Difficulty::new("0").unwrap()
    }

    fn next_block(prev: &Block, txs: Vec<Transaction>, balances: BlockBalances) -> Block {
        Block::new_block(
            prev.get_index() + 1,
            prev.get_hash().to_string(),
            txs,
            balances,
            &easy(),
        )
        .unwrap()
    }

    fn funded_chain() -> Vec<Block> {
        let genesis = Block::generate_genesis_block(&easy()).unwrap();
        let funding = next_block(
            &genesis,
            vec![],
            BlockBalances::snapshot(BTreeMap::from([("alice".to_string(), 100)])),
        );
        vec![genesis, funding]
    }

    #[test]
    fn test_valid_chain() {
        let difficulty = easy();
        let validator = ChainValidator::new(&difficulty);
        let chain = funded_chain();
        assert!(validator.is_chain_valid(&chain));
        assert_eq!(validator.first_invalid_block(&chain), None);
    }

    #[test]
    fn test_genesis_must_be_empty() {
        let difficulty = easy();
        let validator = ChainValidator::new(&difficulty);
        let chain = funded_chain();
        assert!(validator.check_genesis(&chain[0]).is_ok());
        // A funding block is not a genesis block
        assert!(validator.check_genesis(&chain[1]).is_err());

        let credited = Block::new_block(
            1,
            crate::core::genesis_previous_hash(),
            vec![],
            BlockBalances::snapshot(BTreeMap::from([("mallory".to_string(), 5)])),
            &difficulty,
        )
        .unwrap();
        assert!(validator.check_genesis(&credited).is_err());

        let with_transfer = Block::new_block(
            1,
            crate::core::genesis_previous_hash(),
            vec![Transaction::with_timestamp("nobody", "mallory", 5, 1)],
            BlockBalances::empty(),
            &difficulty,
        )
        .unwrap();
        assert!(validator.check_genesis(&with_transfer).is_err());
    }

    #[test]
    fn test_empty_chain_is_invalid() {
        let difficulty = easy();
        assert!(!ChainValidator::new(&difficulty).is_chain_valid(&[]));
    }

    #[test]
    fn test_successor_must_link_to_tip() {
        let difficulty = easy();
        let validator = ChainValidator::new(&difficulty);
        let chain = funded_chain();
        let stale = next_block(&chain[0], vec![], BlockBalances::reward("m", 50));
        assert!(!validator.is_valid_successor(&chain, &stale));

        let fresh = next_block(&chain[1], vec![], BlockBalances::reward("m", 50));
        assert!(validator.is_valid_successor(&chain, &fresh));
    }

    #[test]
    fn test_successor_affordability_uses_pre_block_state() {
        let difficulty = easy();
        let validator = ChainValidator::new(&difficulty);
        let chain = funded_chain();

        let affordable = next_block(
            &chain[1],
            vec![
                Transaction::with_timestamp("alice", "bob", 60, 1),
                Transaction::with_timestamp("alice", "carol", 40, 2),
            ],
            BlockBalances::reward("m", 50),
        );
        assert!(validator.check_successor(&chain, &affordable).is_ok());

        let overspent = next_block(
            &chain[1],
            vec![
                Transaction::with_timestamp("alice", "bob", 60, 1),
                Transaction::with_timestamp("alice", "carol", 41, 2),
            ],
            BlockBalances::reward("m", 50),
        );
        assert!(validator.check_successor(&chain, &overspent).is_err());

        // The miner reward inside the block itself cannot fund a transfer
        let self_funded = next_block(
            &chain[1],
            vec![Transaction::with_timestamp("m", "bob", 10, 1)],
            BlockBalances::reward("m", 50),
        );
        assert!(validator.check_successor(&chain, &self_funded).is_err());
    }

    #[test]
    fn test_successor_rejects_malformed_transaction() {
        let difficulty = easy();
        let validator = ChainValidator::new(&difficulty);
        let chain = funded_chain();
        let block = next_block(
            &chain[1],
            vec![Transaction::with_timestamp("alice", "alice", 10, 1)],
            BlockBalances::reward("m", 50),
        );
        assert!(validator.check_successor(&chain, &block).is_err());
    }

    #[test]
    fn test_block_sealed_for_lower_difficulty_is_rejected() {
        let strict = Difficulty::new("000").unwrap();
        let validator = ChainValidator::new(&strict);
        let chain = funded_chain();
        let weak = next_block(&chain[1], vec![], BlockBalances::reward("m", 50));
        // Sealed for "0"; may satisfy "000" only by luck
        if !weak.get_hash().starts_with("000") {
            assert!(!validator.is_valid_successor(&chain, &weak));
        }
    }
}
