//! Transaction data structures and operations

use crate::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value transfer recorded in a block
///
/// An empty `source` marks a deposit: value enters the system and no
/// account is debited.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    source: String,
    target: String,
    amount: Amount,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(source: impl Into<String>, target: impl Into<String>, amount: Amount) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            amount,
        }
    }

    /// Create a deposit into `target`
    pub fn deposit(target: impl Into<String>, amount: Amount) -> Self {
        Self::new(String::new(), target, amount)
    }

    /// The transaction stored in the genesis block
    pub fn genesis() -> Self {
        Self::new(String::new(), String::new(), 0)
    }

    /// Debited account (empty for deposits)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Credited account
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Check if this transaction is a deposit
    pub fn is_deposit(&self) -> bool {
        self.source.is_empty()
    }

    /// Check if source and target are the same account
    pub fn is_self_transfer(&self) -> bool {
        !self.is_deposit() && self.source == self.target
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_deposit() {
            write!(f, "[Deposit, Target: {}, Amount: {}]", self.target, self.amount)
        } else {
            write!(
                f,
                "[Source: {}, Target: {}, Amount: {}]",
                self.source, self.target, self.amount
            )
        }
    }
}
