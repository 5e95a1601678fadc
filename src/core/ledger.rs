// The ledger engine: it owns the chain, the pending pool and the working
// transaction buffer, and every mutation of them goes through here.
// Nothing is persisted; the chain lives as long as the Ledger value.

use crate::config::Config;
use crate::core::balance::BalanceLedger;
use crate::core::{Amount, Block, BlockBalances, ChainValidator, Difficulty, Transaction};
use crate::error::{LedgerError, Result};
use log::{info, warn};
use std::collections::{BTreeMap, HashMap};
use std::mem;

#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    // Admitted but unconfirmed, in admission order
    pending: Vec<Transaction>,
    // Transactions admitted since the last snapshot-mode block
    buffer: Vec<Transaction>,
    difficulty: Difficulty,
    mining_reward: Amount,
}

impl Ledger {
    /// Create a ledger holding only a freshly sealed genesis block
    pub fn new(difficulty: Difficulty, mining_reward: Amount) -> Result<Ledger> {
        let genesis = Block::generate_genesis_block(&difficulty)?;
        info!("Created genesis block {}", genesis.get_hash());
        Ok(Ledger {
            chain: vec![genesis],
            pending: Vec::new(),
            buffer: Vec::new(),
            difficulty,
            mining_reward,
        })
    }

    pub fn from_config(config: &Config) -> Result<Ledger> {
        Ledger::new(config.get_difficulty()?, config.get_mining_reward())
    }

    pub fn get_difficulty(&self) -> &Difficulty {
        &self.difficulty
    }

    pub fn get_mining_reward(&self) -> Amount {
        self.mining_reward
    }

    pub fn get_chain(&self) -> &[Block] {
        self.chain.as_slice()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn get_tip(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    fn next_index(&self) -> u64 {
        self.chain.len() as u64 + 1
    }

    pub fn get_pending_transactions(&self) -> &[Transaction] {
        self.pending.as_slice()
    }

    pub fn get_buffered_transactions(&self) -> &[Transaction] {
        self.buffer.as_slice()
    }

    fn balances(&self) -> BalanceLedger<'_> {
        BalanceLedger::new(&self.chain, &self.pending)
    }

    pub fn confirmed_balance(&self, address: &str) -> Amount {
        self.balances().confirmed_balance(address)
    }

    pub fn spendable_balance(&self, address: &str) -> Amount {
        self.balances().spendable_balance(address)
    }

    /// Balance an address can currently spend
    pub fn get_balance(&self, address: &str) -> Amount {
        self.spendable_balance(address)
    }

    /// Admit a transfer into the pending pool.
    ///
    /// Returns the index of the block the transfer is expected to land in.
    pub fn add_transaction(&mut self, sender: &str, receiver: &str, amount: Amount) -> Result<usize> {
        let tx = Transaction::new(sender, receiver, amount)?;
        tx.check_well_formed()?;

        let available = self.spendable_balance(sender);
        if amount > available {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        info!("Admitted transaction {sender} -> {receiver} for {amount}");
        self.buffer.push(tx.clone());
        self.pending.push(tx);
        Ok(self.chain.len() + 1)
    }

    /// Administrative credit that bypasses transaction validation.
    ///
    /// Seals a snapshot-mode block carrying the credit together with the
    /// buffered transactions, appends it, and returns the sealed balances.
    pub fn add_balance(&mut self, receiver: &str, amount: Amount) -> Result<BTreeMap<String, Amount>> {
        if receiver.is_empty() {
            return Err(LedgerError::Rejected(
                "Receiver address must not be empty".to_string(),
            ));
        }
        if amount == 0 {
            return Err(LedgerError::Rejected(
                "Balance must be greater than zero".to_string(),
            ));
        }

        let snapshot = BTreeMap::from([(receiver.to_string(), amount)]);
        let previous_hash = self.get_tip().get_hash().to_string();
        let block = self.build_block(snapshot, previous_hash)?;

        let credits = block.get_balances().credits();
        if let Err(e) = self.append_block(block.clone()) {
            // Put the transactions back so a later block can confirm them
            self.buffer = block.get_transactions().to_vec();
            return Err(e);
        }
        info!("Credited {amount} to {receiver} in block {}", block.get_index());
        Ok(credits)
    }

    /// Snapshot mode: seal the buffered transactions with an explicit balances
    /// mapping. The buffer is cleared.
    pub fn build_block(
        &mut self,
        balances_snapshot: BTreeMap<String, Amount>,
        previous_hash: String,
    ) -> Result<Block> {
        let transactions = mem::take(&mut self.buffer);
        Block::new_block(
            self.next_index(),
            previous_hash,
            transactions,
            BlockBalances::snapshot(balances_snapshot),
            &self.difficulty,
        )
    }

    /// Reward mode, unsealed: the block a miner would seal for `transactions`.
    ///
    /// Refuses to build on an invalid chain or with nothing to confirm.
    pub fn reward_template(&self, transactions: Vec<Transaction>, miner: &str) -> Result<Block> {
        if miner.is_empty() {
            return Err(LedgerError::Rejected(
                "Miner address must not be empty".to_string(),
            ));
        }
        if transactions.is_empty() {
            return Err(LedgerError::Rejected(
                "No pending transactions to mine".to_string(),
            ));
        }
        if !self.is_chain_valid() {
            return Err(LedgerError::InvalidBlock(
                "Blockchain is not valid".to_string(),
            ));
        }

        Block::unsealed(
            self.next_index(),
            self.get_tip().get_hash().to_string(),
            transactions,
            BlockBalances::reward(miner, self.mining_reward),
        )
    }

    /// Reward mode: seal `transactions` with the miner's reward as the only
    /// credit. Neither the pool nor the buffer is touched.
    pub fn build_block_from_pending(
        &self,
        transactions: Vec<Transaction>,
        miner: &str,
    ) -> Result<Block> {
        self.reward_template(transactions, miner)?
            .seal(&self.difficulty)
    }

    /// Build a reward-mode block and check it against the current tip.
    ///
    /// The block is not appended; hand it to `accept_external_block`.
    pub fn mine_with_pending(&self, transactions: Vec<Transaction>, miner: &str) -> Result<Block> {
        let block = self.build_block_from_pending(transactions, miner)?;
        self.validator().check_successor(&self.chain, &block).map_err(|e| {
            LedgerError::InvalidBlock(format!("Mined block {} is not valid: {e}", block.get_index()))
        })?;
        Ok(block)
    }

    fn validator(&self) -> ChainValidator<'_> {
        ChainValidator::new(&self.difficulty)
    }

    /// Whether `block` would be accepted as the next block on this chain
    pub fn is_valid_block(&self, block: &Block) -> bool {
        self.validator().is_valid_successor(&self.chain, block)
    }

    pub fn is_chain_valid(&self) -> bool {
        self.validator().is_chain_valid(&self.chain)
    }

    /// Position of the first broken block, `None` for a valid chain
    pub fn first_invalid_block(&self) -> Option<usize> {
        self.validator().first_invalid_block(&self.chain)
    }

    /// Validate any chain under this ledger's difficulty
    pub fn validate_chain(&self, chain: &[Block]) -> bool {
        self.validator().is_chain_valid(chain)
    }

    /// Validate, append and prune the block's transactions from the pool
    pub fn accept_external_block(&mut self, block: Block) -> bool {
        match self.append_block(block) {
            Ok(()) => true,
            Err(e) => {
                warn!("Refused external block: {e}");
                false
            }
        }
    }

    fn append_block(&mut self, block: Block) -> Result<()> {
        self.validator().check_successor(&self.chain, &block)?;

        info!(
            "Appending block {} ({} transactions): {}",
            block.get_index(),
            block.get_transactions().len(),
            block.get_hash()
        );
        let confirmed = block.get_transactions().to_vec();
        self.chain.push(block);
        self.prune_confirmed(&confirmed);
        self.evict_unaffordable();
        Ok(())
    }

    /// Longest-valid-chain rule.
    ///
    /// The candidate replaces the local chain only when it is strictly longer
    /// and every non-genesis block is a valid successor of its predecessor in
    /// the candidate itself.
    pub fn resolve_conflicts(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            info!(
                "Keeping local chain: candidate length {} is not longer than {}",
                candidate.len(),
                self.chain.len()
            );
            return false;
        }

        let validator = self.validator();
        if let Err(e) = validator.check_genesis(&candidate[0]) {
            warn!("Candidate chain rejected at genesis: {e}");
            return false;
        }
        for position in 1..candidate.len() {
            if let Err(e) = validator.check_successor(&candidate[..position], &candidate[position]) {
                warn!("Candidate chain rejected at position {position}: {e}");
                return false;
            }
        }

        info!(
            "Replacing local chain of length {} with candidate of length {}",
            self.chain.len(),
            candidate.len()
        );
        let confirmed: Vec<Transaction> = candidate
            .iter()
            .flat_map(|block| block.get_transactions().iter().cloned())
            .collect();
        self.chain = candidate;
        self.prune_confirmed(&confirmed);
        self.evict_unaffordable();
        true
    }

    // Each confirmed occurrence removes at most one matching entry
    fn prune_confirmed(&mut self, confirmed: &[Transaction]) {
        let mut remaining: HashMap<&Transaction, usize> = HashMap::new();
        for tx in confirmed {
            *remaining.entry(tx).or_insert(0) += 1;
        }

        for list in [&mut self.pending, &mut self.buffer] {
            let mut budget = remaining.clone();
            list.retain(|tx| match budget.get_mut(tx) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    false
                }
                _ => true,
            });
        }
    }

    // Replay the pool in admission order against the new tip and drop every
    // transfer its sender can no longer cover. The buffer follows the pool.
    fn evict_unaffordable(&mut self) {
        let balances = BalanceLedger::confirmed_only(&self.chain);
        let mut outgoing: HashMap<String, u128> = HashMap::new();
        let mut evicted: HashMap<Transaction, usize> = HashMap::new();

        self.pending.retain(|tx| {
            let spent = outgoing.entry(tx.get_sender().to_string()).or_insert(0);
            let available = balances.confirmed_balance(tx.get_sender()) as u128;
            if *spent + tx.get_amount() as u128 <= available {
                *spent += tx.get_amount() as u128;
                true
            } else {
                warn!(
                    "Evicting pending transaction {} -> {} for {}: sender has {available}",
                    tx.get_sender(),
                    tx.get_receiver(),
                    tx.get_amount()
                );
                *evicted.entry(tx.clone()).or_insert(0) += 1;
                false
            }
        });

        if evicted.is_empty() {
            return;
        }
        self.buffer.retain(|tx| match evicted.get_mut(tx) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        });
    }

    #[cfg(test)]
    pub(crate) fn chain_mut(&mut self) -> &mut Vec<Block> {
        &mut self.chain
    }
}
