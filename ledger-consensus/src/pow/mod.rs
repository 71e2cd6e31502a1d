//! Proof-of-work mining

pub mod config;
pub mod miner;

pub use config::MiningConfig;
pub use miner::{mine, mine_block, mine_block_async, mine_with, MiningControl};
