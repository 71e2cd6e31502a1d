//! Core ledger data structures
//!
//! This crate provides the fundamental building blocks for the ledger:
//! - Basic types (Hash, BlockIndex, Amount, etc.)
//! - Transaction and Block structures
//! - The SHA-256 block hash function

pub mod block;
pub mod error;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use block::*;
pub use error::*;
pub use transaction::*;
pub use types::*;
