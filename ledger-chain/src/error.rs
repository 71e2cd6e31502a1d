//! Chain error types

use ledger_consensus::{CancelReason, ConsensusError};
use ledger_core::{Amount, Balance, BlockIndex, Hash};
use thiserror::Error;

/// The admission/verification check a fault belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    /// Block 0 is missing or is not the genesis block
    Genesis,
    /// Index is not the next position in the chain
    IndexContiguity,
    /// Previous hash does not match the preceding block
    Linkage,
    /// Stored hash does not match the block contents
    HashIntegrity,
    /// Hash is rejected by the chain's validator
    ProofOfWork,
    /// Transaction would leave an account negative
    Balance,
}

/// Specific reason a block was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockFault {
    #[error("chain has no genesis block")]
    MissingGenesis,

    #[error("block 0 is not a genesis block")]
    MalformedGenesis,

    #[error("expected index {expected}, got {actual}")]
    IndexOutOfSequence {
        expected: BlockIndex,
        actual: BlockIndex,
    },

    #[error("previous hash does not match the preceding block")]
    BrokenLink,

    #[error("stored hash {stored} does not match computed hash {computed}")]
    HashMismatch { stored: Hash, computed: Hash },

    #[error("hash {0} does not satisfy the proof-of-work policy")]
    ProofOfWork(Hash),

    #[error("negative amount {0}")]
    NegativeAmount(Amount),

    #[error("account '{account}' would be left with balance {balance}")]
    Overdrawn { account: String, balance: Balance },

    #[error("balance of account '{account}' would overflow")]
    BalanceOverflow { account: String },
}

impl BlockFault {
    /// Which check this fault belongs to
    pub fn check(&self) -> CheckKind {
        match self {
            BlockFault::MissingGenesis | BlockFault::MalformedGenesis => CheckKind::Genesis,
            BlockFault::IndexOutOfSequence { .. } => CheckKind::IndexContiguity,
            BlockFault::BrokenLink => CheckKind::Linkage,
            BlockFault::HashMismatch { .. } => CheckKind::HashIntegrity,
            BlockFault::ProofOfWork(_) => CheckKind::ProofOfWork,
            BlockFault::NegativeAmount(_)
            | BlockFault::Overdrawn { .. }
            | BlockFault::BalanceOverflow { .. } => CheckKind::Balance,
        }
    }
}

/// Chain error type
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    /// `append` rejected a block; the chain is unchanged
    #[error("Invalid block #{index}: {fault}")]
    InvalidBlock { index: BlockIndex, fault: BlockFault },

    /// Full re-verification found a fault at `index`
    #[error("Chain verification failed at block #{index}: {fault}")]
    Verification { index: usize, fault: BlockFault },

    /// Mining failed or was cancelled
    #[error(transparent)]
    Mining(#[from] ConsensusError),

    /// Block indices are 32-bit
    #[error("Chain is full at {0} blocks")]
    CapacityExceeded(usize),

    #[error("Maintained ledger does not match a replay of the chain")]
    LedgerDiverged,
}

impl ChainError {
    /// The failed check, for admission and verification errors
    pub fn check(&self) -> Option<CheckKind> {
        match self {
            ChainError::InvalidBlock { fault, .. } | ChainError::Verification { fault, .. } => {
                Some(fault.check())
            }
            _ => None,
        }
    }

    /// Check if mining was stopped by cancellation or deadline
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ChainError::Mining(ConsensusError::MiningCancelled { .. })
        )
    }

    /// Check if mining ran out of nonces
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            ChainError::Mining(ConsensusError::ProofOfWorkExhausted { .. })
        )
    }

    /// Cancellation reason, if mining was cancelled
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            ChainError::Mining(ConsensusError::MiningCancelled { reason, .. }) => Some(*reason),
            _ => None,
        }
    }
}

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;
