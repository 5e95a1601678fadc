//! Test utilities for ledger testing

use crate::core::{Amount, Block, Difficulty, Ledger};
use crate::error::Result;
use rand::Rng;

/// Test configuration for ledger testing
pub struct TestConfig {
    pub difficulty: &'static str,
    pub mining_reward: Amount,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            difficulty: "0", // Easy difficulty for fast testing
            mining_reward: 50,
        }
    }
}

/// Create a ledger with the default test configuration
pub fn create_test_ledger(config: &TestConfig) -> Result<Ledger> {
    Ledger::new(Difficulty::new(config.difficulty)?, config.mining_reward)
}

pub fn easy_ledger() -> Ledger {
    create_test_ledger(&TestConfig::default()).unwrap()
}

/// Ledger with one funding block per `(address, amount)` entry
pub fn funded_ledger(credits: &[(&str, Amount)]) -> Result<Ledger> {
    let mut ledger = create_test_ledger(&TestConfig::default())?;
    for (address, amount) in credits {
        ledger.add_balance(address, *amount)?;
    }
    Ok(ledger)
}

/// Rewrite a block through its JSON form, keeping nonce and hash as they were
pub fn tamper_block<F>(block: &Block, edit: F) -> Block
where
    F: FnOnce(&mut serde_json::Value),
{
    let mut value = serde_json::to_value(block).unwrap();
    edit(&mut value);
    serde_json::from_value(value).unwrap()
}

/// Shift the timestamp of a random non-genesis block; returns its position
pub fn tamper_random_block(chain: &mut [Block]) -> usize {
    assert!(chain.len() > 1, "need a block past genesis to tamper with");
    let position = rand::thread_rng().gen_range(1..chain.len());
    let timestamp = chain[position].get_timestamp();
    chain[position] = tamper_block(&chain[position], |value| {
        value["timestamp"] = serde_json::json!(timestamp + 1);
    });
    position
}

/// Extend a copy of `ledger` by `extra_blocks` funding blocks
pub fn create_fork_scenario(ledger: &Ledger, extra_blocks: usize) -> Result<Vec<Block>> {
    let mut fork = ledger.clone();
    for i in 0..extra_blocks {
        fork.add_balance(&format!("fork-{i}"), 1)?;
    }
    Ok(fork.get_chain().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_ledger() {
        let ledger = easy_ledger();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get_mining_reward(), 50);
    }

    #[test]
    fn test_funded_ledger() {
        let ledger = funded_ledger(&[("a", 10), ("b", 20)]).unwrap();
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.get_balance("a"), 10);
        assert_eq!(ledger.get_balance("b"), 20);
    }

    #[test]
    fn test_tamper_random_block_is_detected() {
        let ledger = funded_ledger(&[("a", 10), ("b", 20), ("c", 30)]).unwrap();
        let mut chain = ledger.get_chain().to_vec();
        let position = tamper_random_block(&mut chain);
        assert!(position >= 1 && position < chain.len());
        assert!(!ledger.validate_chain(&chain));
    }

    #[test]
    fn test_create_fork_scenario() {
        let ledger = funded_ledger(&[("a", 10)]).unwrap();
        let fork = create_fork_scenario(&ledger, 2).unwrap();
        assert_eq!(fork.len(), ledger.len() + 2);
        assert_eq!(&fork[..ledger.len()], ledger.get_chain());
        assert!(ledger.validate_chain(&fork));
    }
}
