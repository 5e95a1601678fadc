use crate::core::{Amount, Block, Transaction};
use std::collections::BTreeMap;

/// Read-only balance view over a chain prefix and a pending pool
///
/// Nothing is cached. Every query replays the blocks from genesis, so the
/// answer always reflects exactly the slices the view was built from.
#[derive(Debug, Clone, Copy)]
pub struct BalanceLedger<'a> {
    blocks: &'a [Block],
    pending: &'a [Transaction],
}

impl<'a> BalanceLedger<'a> {
    pub fn new(blocks: &'a [Block], pending: &'a [Transaction]) -> Self {
        BalanceLedger { blocks, pending }
    }

    /// View over blocks only, as used when validating a block in isolation
    pub fn confirmed_only(blocks: &'a [Block]) -> Self {
        BalanceLedger {
            blocks,
            pending: &[],
        }
    }

    /// Credits plus received minus sent, over every block
    pub fn confirmed_balance(&self, address: &str) -> Amount {
        clamp(self.net_confirmed(address))
    }

    /// Sum of the address's outgoing amounts still in the pending pool
    pub fn pending_outgoing(&self, address: &str) -> Amount {
        clamp(
            self.pending
                .iter()
                .filter(|tx| tx.get_sender() == address)
                .map(|tx| tx.get_amount() as i128)
                .sum(),
        )
    }

    /// Confirmed balance minus pending outgoing, never above the confirmed one
    pub fn spendable_balance(&self, address: &str) -> Amount {
        self.confirmed_balance(address)
            .saturating_sub(self.pending_outgoing(address))
    }

    fn net_confirmed(&self, address: &str) -> i128 {
        let mut balance: i128 = 0;
        for block in self.blocks {
            balance += block.get_balances().credit_for(address) as i128;
            for tx in block.get_transactions() {
                if tx.get_sender() == address {
                    balance -= tx.get_amount() as i128;
                }
                if tx.get_receiver() == address {
                    balance += tx.get_amount() as i128;
                }
            }
        }
        balance
    }
}

/// Total amount each sender moves out in a transaction list
pub fn outgoing_by_sender(transactions: &[Transaction]) -> BTreeMap<&str, u128> {
    let mut totals: BTreeMap<&str, u128> = BTreeMap::new();
    for tx in transactions {
        *totals.entry(tx.get_sender()).or_insert(0) += tx.get_amount() as u128;
    }
    totals
}

fn clamp(value: i128) -> Amount {
    value.clamp(0, Amount::MAX as i128) as Amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BlockBalances, Difficulty};

    fn block(index: u64, txs: Vec<Transaction>, balances: BlockBalances) -> Block {
        Block::unsealed_with_timestamp(index, 0, "prev".to_string(), txs, balances)
            .unwrap()
            .seal(&Difficulty::new("0").unwrap())
            .unwrap()
    }

    fn credit(address: &str, amount: Amount) -> BlockBalances {
        BlockBalances::snapshot(BTreeMap::from([(address.to_string(), amount)]))
    }

    #[test]
    fn test_confirmed_balance_replays_credits_and_transfers() {
        let blocks = vec![
            block(1, vec![], BlockBalances::empty()),
            block(2, vec![], credit("alice", 100)),
            block(
                3,
                vec![Transaction::with_timestamp("alice", "bob", 30, 1)],
                BlockBalances::reward("miner", 50),
            ),
        ];
        let ledger = BalanceLedger::confirmed_only(&blocks);

        assert_eq!(ledger.confirmed_balance("alice"), 70);
        assert_eq!(ledger.confirmed_balance("bob"), 30);
        assert_eq!(ledger.confirmed_balance("miner"), 50);
        assert_eq!(ledger.confirmed_balance("nobody"), 0);
    }

    #[test]
    fn test_spendable_subtracts_pending_outgoing() {
        let blocks = vec![block(1, vec![], credit("alice", 100))];
        let pending = vec![
            Transaction::with_timestamp("alice", "bob", 40, 1),
            Transaction::with_timestamp("bob", "alice", 5, 2),
        ];
        let ledger = BalanceLedger::new(&blocks, &pending);

        assert_eq!(ledger.confirmed_balance("alice"), 100);
        assert_eq!(ledger.pending_outgoing("alice"), 40);
        assert_eq!(ledger.spendable_balance("alice"), 60);
        // Incoming pending value is not spendable yet
        assert_eq!(ledger.spendable_balance("bob"), 0);
    }

    #[test]
    fn test_spendable_never_exceeds_confirmed() {
        let blocks = vec![block(1, vec![], credit("alice", 10))];
        let pending = vec![Transaction::with_timestamp("alice", "bob", 25, 1)];
        let ledger = BalanceLedger::new(&blocks, &pending);
        assert!(ledger.spendable_balance("alice") <= ledger.confirmed_balance("alice"));
        assert_eq!(ledger.spendable_balance("alice"), 0);

        let idle = BalanceLedger::new(&blocks, &[]);
        assert_eq!(
            idle.spendable_balance("alice"),
            idle.confirmed_balance("alice")
        );
    }

    #[test]
    fn test_outgoing_by_sender_aggregates() {
        let txs = vec![
            Transaction::with_timestamp("a", "b", 3, 1),
            Transaction::with_timestamp("a", "c", 4, 2),
            Transaction::with_timestamp("b", "c", 1, 3),
        ];
        let totals = outgoing_by_sender(&txs);
        assert_eq!(totals.get("a"), Some(&7));
        assert_eq!(totals.get("b"), Some(&1));
        assert_eq!(totals.get("c"), None);
    }
}
