//! Block data structures and the block hash function

use crate::{BlockIndex, Hash, Nonce, Transaction};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 state primed with everything a block hashes except the nonce.
///
/// The preimage is, in order: index (4 bytes BE), source bytes, target
/// bytes, amount (4 bytes BE), previous hash bytes (absent for genesis)
/// and nonce (8 bytes BE). Mining clones the primed state once per
/// attempt instead of rehashing the whole preimage.
#[derive(Clone)]
pub struct BlockHasher {
    prefix: Sha256,
}

impl BlockHasher {
    /// Prime a hasher for the given block contents
    pub fn new(index: BlockIndex, transaction: &Transaction, previous_hash: Option<&Hash>) -> Self {
        let mut prefix = Sha256::new();
        prefix.update(index.to_be_bytes());
        prefix.update(transaction.source().as_bytes());
        prefix.update(transaction.target().as_bytes());
        prefix.update(transaction.amount().to_be_bytes());
        if let Some(previous) = previous_hash {
            prefix.update(previous.as_bytes());
        }
        Self { prefix }
    }

    /// Finish the preimage with `nonce` and hash it
    pub fn hash_with_nonce(&self, nonce: Nonce) -> Hash {
        let mut hasher = self.prefix.clone();
        hasher.update(nonce.to_be_bytes());
        Hash::new(hasher.finalize().as_slice())
    }
}

/// Compute the hash of a block from its contents
pub fn compute_hash(
    index: BlockIndex,
    transaction: &Transaction,
    previous_hash: Option<&Hash>,
    nonce: Nonce,
) -> Hash {
    BlockHasher::new(index, transaction, previous_hash).hash_with_nonce(nonce)
}

/// A sealed block: one transaction linked to its predecessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: BlockIndex,
    transaction: Transaction,
    previous_hash: Option<Hash>,
    nonce: Nonce,
    hash: Hash,
}

impl Block {
    /// Rebuild a block from a known nonce, computing its hash.
    ///
    /// The nonce is not checked against any validator here; admission
    /// to a chain does that.
    pub fn new(
        index: BlockIndex,
        transaction: Transaction,
        previous_hash: Option<Hash>,
        nonce: Nonce,
    ) -> Self {
        let hash = compute_hash(index, &transaction, previous_hash.as_ref(), nonce);
        Self {
            index,
            transaction,
            previous_hash,
            nonce,
            hash,
        }
    }

    /// Rehydrate a block with its stored hash taken verbatim
    pub fn from_parts(
        index: BlockIndex,
        transaction: Transaction,
        previous_hash: Option<Hash>,
        nonce: Nonce,
        hash: Hash,
    ) -> Self {
        Self {
            index,
            transaction,
            previous_hash,
            nonce,
            hash,
        }
    }

    /// Genesis block with the given nonce
    pub fn genesis(nonce: Nonce) -> Self {
        Self::new(0, Transaction::genesis(), None, nonce)
    }

    pub fn index(&self) -> BlockIndex {
        self.index
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Hash of the preceding block (`None` only for genesis)
    pub fn previous_hash(&self) -> Option<&Hash> {
        self.previous_hash.as_ref()
    }

    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// Stored hash of this block
    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    /// Re-derive the hash from the stored fields
    pub fn compute_hash(&self) -> Hash {
        compute_hash(
            self.index,
            &self.transaction,
            self.previous_hash.as_ref(),
            self.nonce,
        )
    }

    /// Check that the stored hash matches the block contents
    pub fn has_consistent_hash(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// Check if block has the shape of the genesis block
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash.is_none() && self.transaction == Transaction::genesis()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block {} (Transaction: {}, Nonce: {}, prevHash: {}, hash: {})",
            self.index,
            self.transaction,
            self.nonce,
            self.previous_hash
                .as_ref()
                .map(Hash::to_hex)
                .unwrap_or_default(),
            self.hash
        )
    }
}
