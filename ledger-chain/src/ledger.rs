//! Balance ledger with cheap snapshots

use crate::account::{Account, BalanceChanges};
use crate::error::BlockFault;
use ledger_core::{Balance, Transaction};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Account balances derived from the admitted transactions.
///
/// Entries live behind an `Arc` so readers can hold a snapshot while the
/// owner keeps mutating; a write only copies the map when a snapshot is
/// still alive.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    accounts: Arc<BTreeMap<String, Account>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance, 0 for unknown accounts
    pub fn balance_of(&self, account: &str) -> Balance {
        self.accounts.get(account).map_or(0, |entry| entry.balance)
    }

    /// Number of accounts with an entry
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Check that applying `transaction` leaves no account negative
    pub fn check(&self, transaction: &Transaction) -> Result<BalanceChanges, BlockFault> {
        if transaction.amount() < 0 {
            return Err(BlockFault::NegativeAmount(transaction.amount()));
        }

        let changes = BalanceChanges::from_transaction(transaction);
        for (account, delta) in changes.iter() {
            let balance = self.balance_of(account).checked_add(delta).ok_or_else(|| {
                BlockFault::BalanceOverflow {
                    account: account.to_string(),
                }
            })?;
            if balance < 0 {
                return Err(BlockFault::Overdrawn {
                    account: account.to_string(),
                    balance,
                });
            }
        }
        Ok(changes)
    }

    /// Check and apply `transaction`
    pub fn admit(&mut self, transaction: &Transaction) -> Result<(), BlockFault> {
        let changes = self.check(transaction)?;
        self.apply(&changes);
        Ok(())
    }

    /// Apply previously checked changes
    pub fn apply(&mut self, changes: &BalanceChanges) {
        let accounts = Arc::make_mut(&mut self.accounts);
        for (account, delta) in changes.iter() {
            let entry = accounts.entry(account.to_string()).or_default();
            entry.balance += delta;
            entry.transactions += 1;
        }
    }

    /// Undo `changes`, dropping entries no transaction names any more
    pub fn revert(&mut self, changes: &BalanceChanges) {
        let accounts = Arc::make_mut(&mut self.accounts);
        for (account, delta) in changes.iter() {
            if let Some(entry) = accounts.get_mut(account) {
                entry.balance -= delta;
                entry.transactions = entry.transactions.saturating_sub(1);
                if entry.is_unreferenced() {
                    accounts.remove(account);
                }
            }
        }
    }

    /// Balances as an owned map
    pub fn balances(&self) -> BTreeMap<String, Balance> {
        self.accounts
            .iter()
            .map(|(account, entry)| (account.clone(), entry.balance))
            .collect()
    }

    /// Lazily enumerate account identifiers over the current snapshot
    pub fn accounts(&self) -> Accounts {
        Accounts {
            accounts: Arc::clone(&self.accounts),
            cursor: Cursor::Start,
        }
    }
}

#[derive(Debug, Clone)]
enum Cursor {
    Start,
    After(String),
    Done,
}

/// Iterator over the account identifiers of a ledger snapshot
#[derive(Debug, Clone)]
pub struct Accounts {
    accounts: Arc<BTreeMap<String, Account>>,
    cursor: Cursor,
}

impl Iterator for Accounts {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let next = match &self.cursor {
            Cursor::Start => self.accounts.keys().next().cloned(),
            Cursor::After(last) => self
                .accounts
                .range::<str, _>((Bound::Excluded(last.as_str()), Bound::Unbounded))
                .next()
                .map(|(account, _)| account.clone()),
            Cursor::Done => None,
        };

        self.cursor = match &next {
            Some(account) => Cursor::After(account.clone()),
            None => Cursor::Done,
        };
        next
    }
}
