//! Error types for the core crate

use thiserror::Error;

/// Core ledger errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Byte access outside `[0, len)`
    #[error("Index {index} out of range for hash of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
