//! Consensus error types

use ledger_core::Nonce;
use thiserror::Error;

/// Why a nonce search stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The cancellation token was triggered
    Cancelled,
    /// The mining deadline elapsed
    DeadlineElapsed,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("cancelled"),
            CancelReason::DeadlineElapsed => f.write_str("deadline elapsed"),
        }
    }
}

/// Consensus error type
#[derive(Error, Debug, Clone)]
pub enum ConsensusError {
    /// Every nonce in `0..=max_nonce` was tried without success
    #[error("Proof of work exhausted: no nonce in 0..={max_nonce} satisfies the validator")]
    ProofOfWorkExhausted { max_nonce: Nonce },

    /// Mining was stopped from outside before a nonce was found
    #[error("Mining {reason} after {attempts} attempts")]
    MiningCancelled { reason: CancelReason, attempts: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The blocking mining worker failed to complete
    #[error("Mining worker failed: {0}")]
    Worker(String),
}

impl From<toml::de::Error> for ConsensusError {
    fn from(err: toml::de::Error) -> Self {
        ConsensusError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for ConsensusError {
    fn from(err: toml::ser::Error) -> Self {
        ConsensusError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ConsensusError {
    fn from(err: tokio::task::JoinError) -> Self {
        ConsensusError::Worker(err.to_string())
    }
}

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;
