//! Basic ledger types

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Block index type (a 32-bit unsigned integer, hashed big-endian)
pub type BlockIndex = u32;

/// Nonce type searched by the miner
pub type Nonce = u64;

/// Transfer amount. Signed so that a forged negative amount can be
/// represented and rejected during admission and verification.
pub type Amount = i32;

/// Account balance as tracked by the ledger
pub type Balance = i64;

/// Owned, immutable byte sequence produced by the block hash function
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Hash(Box<[u8]>);

impl Hash {
    /// Create a new hash, copying the given bytes
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    /// Number of bytes in the hash
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the hash holds no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the byte at `index`
    pub fn byte_at(&self, index: usize) -> CoreResult<u8> {
        self.0.get(index).copied().ok_or(CoreError::IndexOutOfRange {
            index,
            len: self.0.len(),
        })
    }

    /// Borrow the underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Copy of the underlying bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Convert to an uppercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.0)
    }

    /// Create from a hex string (either case)
    pub fn from_hex(hex: &str) -> CoreResult<Self> {
        Ok(Self(hex::decode(hex)?.into_boxed_slice()))
    }

    /// Number of leading zero bytes
    pub fn leading_zero_bytes(&self) -> usize {
        self.0.iter().take_while(|b| **b == 0).count()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<&[u8]> for Hash {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for Hash {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for Hash {
    type Error = CoreError;

    fn try_from(hex: String) -> Result<Self, Self::Error> {
        Self::from_hex(&hex)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
