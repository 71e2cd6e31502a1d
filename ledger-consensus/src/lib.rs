//! Proof-of-work consensus
//!
//! This crate provides the difficulty policy a chain admits blocks under
//! and the cancellable nonce search used to satisfy it.

pub mod error;
pub mod pow;
pub mod traits;

pub use error::{CancelReason, ConsensusError, ConsensusResult};
pub use pow::{MiningConfig, MiningControl};
pub use traits::{HashValidator, LeadingZeroBytes};
