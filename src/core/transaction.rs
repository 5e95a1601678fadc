// A transaction moves an amount from one address to another. There are no
// inputs or outputs to track: balances are derived by replaying the chain.

use crate::core::Amount;
use crate::error::{LedgerError, Result};
use crate::utils::{canonical_json, current_timestamp, sha256_hex};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    sender: String,
    receiver: String,
    amount: Amount,
    timestamp: i64,
    // Reserved for signed transfers; never populated today
    signature: Option<Vec<u8>>,
}

impl Transaction {
    /// Build a transfer stamped with the current time
    pub fn new(sender: &str, receiver: &str, amount: Amount) -> Result<Transaction> {
        Ok(Self::with_timestamp(
            sender,
            receiver,
            amount,
            current_timestamp()?,
        ))
    }

    pub fn with_timestamp(sender: &str, receiver: &str, amount: Amount, timestamp: i64) -> Self {
        Transaction {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            timestamp,
            signature: None,
        }
    }

    pub fn get_sender(&self) -> &str {
        self.sender.as_str()
    }

    pub fn get_receiver(&self) -> &str {
        self.receiver.as_str()
    }

    pub fn get_amount(&self) -> Amount {
        self.amount
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// Check the parts of a transfer that do not depend on ledger state
    pub fn check_well_formed(&self) -> Result<()> {
        if self.sender.is_empty() || self.receiver.is_empty() {
            return Err(LedgerError::Rejected(
                "Sender and receiver addresses must not be empty".to_string(),
            ));
        }
        if self.sender == self.receiver {
            return Err(LedgerError::Rejected(
                "Sender cannot be the same as receiver".to_string(),
            ));
        }
        if self.amount == 0 {
            return Err(LedgerError::Rejected(
                "Transaction amount must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Sorted-key JSON encoding, the input to every transaction hash
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        canonical_json(self)
    }

    /// Content hash; this is the Merkle leaf for the transaction
    pub fn hash(&self) -> Result<String> {
        Ok(sha256_hex(&self.canonical_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction_has_no_signature() {
        let tx = Transaction::new("alice", "bob", 40).unwrap();
        assert_eq!(tx.get_sender(), "alice");
        assert_eq!(tx.get_receiver(), "bob");
        assert_eq!(tx.get_amount(), 40);
        assert!(tx.get_signature().is_none());
        assert!(tx.get_timestamp() > 0);
    }

    #[test]
    fn test_well_formed_checks() {
        assert!(Transaction::with_timestamp("a", "b", 1, 0)
            .check_well_formed()
            .is_ok());
        assert!(Transaction::with_timestamp("a", "a", 1, 0)
            .check_well_formed()
            .is_err());
        assert!(Transaction::with_timestamp("a", "b", 0, 0)
            .check_well_formed()
            .is_err());
        assert!(Transaction::with_timestamp("", "b", 5, 0)
            .check_well_formed()
            .is_err());
    }

    #[test]
    fn test_canonical_encoding_is_sorted() {
        let tx = Transaction::with_timestamp("a", "b", 5, 10);
        let encoded = String::from_utf8(tx.canonical_bytes().unwrap()).unwrap();
        assert_eq!(
            encoded,
            r#"{"amount":5,"receiver":"b","sender":"a","signature":null,"timestamp":10}"#
        );
    }

    #[test]
    fn test_hash_depends_on_content() {
        let tx1 = Transaction::with_timestamp("a", "b", 5, 10);
        let tx2 = Transaction::with_timestamp("a", "b", 6, 10);
        assert_eq!(tx1.hash().unwrap(), tx1.clone().hash().unwrap());
        assert_ne!(tx1.hash().unwrap(), tx2.hash().unwrap());
    }
}
