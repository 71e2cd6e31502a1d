//! Account entries and the balance changes a transaction makes

use ledger_core::{Balance, Transaction};

/// Ledger entry for one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Account {
    /// Current balance
    pub balance: Balance,
    /// Number of admitted transactions naming this account
    pub transactions: u64,
}

impl Account {
    /// Check if no admitted transaction names this account
    pub fn is_unreferenced(&self) -> bool {
        self.transactions == 0
    }
}

/// Net per-account balance change of a single transaction.
///
/// The target is credited and a non-empty source is debited. A
/// self-transfer collapses into one entry with a zero delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChanges {
    entries: Vec<(String, Balance)>,
}

impl BalanceChanges {
    /// Compute the changes `transaction` makes when applied
    pub fn from_transaction(transaction: &Transaction) -> Self {
        let amount = Balance::from(transaction.amount());
        let mut entries = vec![(transaction.target().to_string(), amount)];

        if !transaction.is_deposit() {
            if transaction.is_self_transfer() {
                entries[0].1 = 0;
            } else {
                entries.push((transaction.source().to_string(), -amount));
            }
        }

        Self { entries }
    }

    /// Accounts touched and their deltas
    pub fn iter(&self) -> impl Iterator<Item = (&str, Balance)> {
        self.entries.iter().map(|(account, delta)| (account.as_str(), *delta))
    }
}
