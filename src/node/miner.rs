use crate::config::Config;
use crate::core::{Amount, Block, Ledger, Transaction};
use crate::error::{LedgerError, Result};
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Chain changes pushed to subscribers after they are committed
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// A block was appended to the tip
    NewBlock(Block),
    /// The whole chain was replaced by a longer valid one
    ChainReplaced(Vec<Block>),
}

#[derive(Clone)]
pub struct MinerNode {
    ledger: Arc<RwLock<Ledger>>,
    // Held for validate, build, append and notify
    mining_lock: Arc<Mutex<()>>,
    subscribers: Arc<Mutex<Vec<Sender<NodeEvent>>>>,
}

impl MinerNode {
    pub fn new(ledger: Ledger) -> MinerNode {
        MinerNode {
            ledger: Arc::new(RwLock::new(ledger)),
            mining_lock: Arc::new(Mutex::new(())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn from_config(config: &Config) -> Result<MinerNode> {
        Ok(MinerNode::new(Ledger::from_config(config)?))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Ledger>> {
        self.ledger
            .read()
            .map_err(|e| LedgerError::Lock(format!("Failed to acquire ledger read lock: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Ledger>> {
        self.ledger
            .write()
            .map_err(|e| LedgerError::Lock(format!("Failed to acquire ledger write lock: {e}")))
    }

    fn lock_mining(&self) -> Result<MutexGuard<'_, ()>> {
        self.mining_lock
            .lock()
            .map_err(|e| LedgerError::Lock(format!("Failed to acquire mining lock: {e}")))
    }

    /// Receive every event committed from now on
    pub fn subscribe(&self) -> Result<Receiver<NodeEvent>> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers
            .lock()
            .map_err(|e| LedgerError::Lock(format!("Failed to acquire subscriber lock: {e}")))?
            .push(sender);
        Ok(receiver)
    }

    fn notify(&self, event: NodeEvent) {
        match self.subscribers.lock() {
            // Drop subscribers whose receiver has gone away
            Ok(mut subscribers) => subscribers.retain(|s| s.send(event.clone()).is_ok()),
            Err(e) => warn!("Skipping notification, subscriber lock poisoned: {e}"),
        }
    }

    pub fn add_transaction(&self, sender: &str, receiver: &str, amount: Amount) -> Result<usize> {
        self.write()?.add_transaction(sender, receiver, amount)
    }

    /// Administrative credit. Appends a block, so it is serialized with mining.
    pub fn add_balance(&self, receiver: &str, amount: Amount) -> Result<BTreeMap<String, Amount>> {
        let _guard = self.lock_mining()?;
        let (credits, tip) = {
            let mut ledger = self.write()?;
            let credits = ledger.add_balance(receiver, amount)?;
            (credits, ledger.get_tip().clone())
        };
        self.notify(NodeEvent::NewBlock(tip));
        Ok(credits)
    }

    pub fn get_balance(&self, address: &str) -> Result<Amount> {
        Ok(self.read()?.get_balance(address))
    }

    pub fn get_pending_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.read()?.get_pending_transactions().to_vec())
    }

    pub fn get_chain(&self) -> Result<Vec<Block>> {
        Ok(self.read()?.get_chain().to_vec())
    }

    pub fn get_height(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_chain_valid(&self) -> Result<bool> {
        Ok(self.read()?.is_chain_valid())
    }

    pub fn first_invalid_block(&self) -> Result<Option<usize>> {
        Ok(self.read()?.first_invalid_block())
    }

    /// Mine the current pending pool and credit `miner` with the reward.
    ///
    /// The nonce search runs without the ledger write lock, so queries keep
    /// being answered while a block is sealed. If the tip moved in the
    /// meantime the sealed block is refused when it is appended.
    pub fn mine(&self, miner: &str) -> Result<Block> {
        let _guard = self.lock_mining()?;

        let (template, difficulty) = {
            let ledger = self.read()?;
            let pending = ledger.get_pending_transactions().to_vec();
            (
                ledger.reward_template(pending, miner)?,
                ledger.get_difficulty().clone(),
            )
        };

        let block = template.seal(&difficulty)?;

        if !self.write()?.accept_external_block(block.clone()) {
            return Err(LedgerError::InvalidBlock(format!(
                "Mined block {} was not accepted",
                block.get_hash()
            )));
        }

        info!("New block {} is mined by {miner}", block.get_hash());
        self.notify(NodeEvent::NewBlock(block.clone()));
        Ok(block)
    }

    /// Append a block sealed elsewhere
    pub fn accept_block(&self, block: Block) -> Result<bool> {
        let _guard = self.lock_mining()?;
        let accepted = self.write()?.accept_external_block(block.clone());
        if accepted {
            self.notify(NodeEvent::NewBlock(block));
        }
        Ok(accepted)
    }

    /// Adopt `candidate` if it is strictly longer and fully valid
    pub fn resolve_conflicts(&self, candidate: Vec<Block>) -> Result<bool> {
        let _guard = self.lock_mining()?;
        let replaced = self.write()?.resolve_conflicts(candidate);
        if replaced {
            let chain = self.read()?.get_chain().to_vec();
            self.notify(NodeEvent::ChainReplaced(chain));
        }
        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::easy_ledger;
    use std::thread;

    fn funded_node() -> MinerNode {
        let node = MinerNode::new(easy_ledger());
        node.add_balance("alice", 100).unwrap();
        node
    }

    #[test]
    fn test_mine_confirms_pending_and_notifies() {
        let node = funded_node();
        let events = node.subscribe().unwrap();
        node.add_transaction("alice", "bob", 40).unwrap();

        let block = node.mine("miner").unwrap();
        assert_eq!(block.get_transactions().len(), 1);
        assert!(node.get_pending_transactions().unwrap().is_empty());
        assert_eq!(node.get_balance("bob").unwrap(), 40);
        assert_eq!(node.get_balance("miner").unwrap(), 50);
        assert!(node.is_chain_valid().unwrap());

        assert_eq!(events.recv().unwrap(), NodeEvent::NewBlock(block));
    }

    #[test]
    fn test_mine_empty_pool_is_rejected() {
        let node = funded_node();
        let result = node.mine("miner");
        assert!(matches!(result, Err(LedgerError::Rejected(_))));
        assert_eq!(node.get_height().unwrap(), 2);
    }

    #[test]
    fn test_racing_miners_append_once() {
        let node = funded_node();
        node.add_transaction("alice", "bob", 10).unwrap();
        node.add_transaction("alice", "carol", 10).unwrap();

        let handles: Vec<_> = ["m1", "m2", "m3"]
            .into_iter()
            .map(|miner| {
                let node = node.clone();
                thread::spawn(move || node.mine(miner))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(node.get_height().unwrap(), 3);
        assert!(node.is_chain_valid().unwrap());
        assert_eq!(node.get_balance("alice").unwrap(), 80);
    }

    #[test]
    fn test_accept_block_refuses_stale_block() {
        let node = funded_node();
        node.add_transaction("alice", "bob", 5).unwrap();

        let stale = {
            let ledger = easy_ledger();
            let tx = Transaction::with_timestamp("x", "y", 1, 0);
            ledger.reward_template(vec![tx], "m").unwrap()
        };
        assert!(!node.accept_block(stale).unwrap());
        assert_eq!(node.get_height().unwrap(), 2);
    }

    #[test]
    fn test_resolve_conflicts_notifies_replacement() {
        let node = funded_node();
        let events = node.subscribe().unwrap();

        let longer = MinerNode::new(easy_ledger());
        longer.add_balance("x", 1).unwrap();
        longer.add_balance("y", 2).unwrap();
        let candidate = longer.get_chain().unwrap();

        assert!(node.resolve_conflicts(candidate.clone()).unwrap());
        assert_eq!(node.get_chain().unwrap(), candidate);
        assert_eq!(events.recv().unwrap(), NodeEvent::ChainReplaced(candidate));

        // Same length is never adopted
        let again = longer.get_chain().unwrap();
        assert!(!node.resolve_conflicts(again).unwrap());
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let node = funded_node();
        drop(node.subscribe().unwrap());
        node.add_balance("bob", 1).unwrap();
        assert!(node.subscribers.lock().unwrap().is_empty());
    }
}
