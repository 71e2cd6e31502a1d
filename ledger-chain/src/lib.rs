//! Ledger chain engine
//!
//! This crate ties blocks, proof of work and the balance ledger together:
//! block admission, removal of the tail, full re-verification and
//! snapshot iteration over blocks, transactions and accounts.

pub mod account;
pub mod chain;
pub mod error;
pub mod iter;
pub mod ledger;
pub mod verify;

pub use account::{Account, BalanceChanges};
pub use chain::BlockChain;
pub use error::{BlockFault, ChainError, ChainResult, CheckKind};
pub use iter::{Blocks, Transactions};
pub use ledger::{Accounts, Ledger};
pub use verify::verify_blocks;
