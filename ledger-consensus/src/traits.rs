//! Proof-of-work policy traits and the standard difficulty policy

use ledger_core::Hash;
use std::fmt;

/// Predicate deciding whether a block hash satisfies the difficulty policy.
///
/// A chain holds exactly one validator for its lifetime and uses it for
/// mining, admission and verification alike.
pub trait HashValidator: Send + Sync {
    /// Check whether `hash` is acceptable
    fn is_valid(&self, hash: &Hash) -> bool;
}

impl<F> HashValidator for F
where
    F: Fn(&Hash) -> bool + Send + Sync,
{
    fn is_valid(&self, hash: &Hash) -> bool {
        self(hash)
    }
}

/// Accepts hashes whose first `difficulty` bytes are zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadingZeroBytes {
    difficulty: usize,
}

impl LeadingZeroBytes {
    /// Create a validator requiring `difficulty` leading zero bytes
    pub fn new(difficulty: usize) -> Self {
        Self { difficulty }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }
}

impl HashValidator for LeadingZeroBytes {
    fn is_valid(&self, hash: &Hash) -> bool {
        hash.len() >= self.difficulty
            && hash.as_bytes()[..self.difficulty].iter().all(|b| *b == 0)
    }
}

impl fmt::Display for LeadingZeroBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} leading zero byte(s)", self.difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_difficulty_accepts_everything() {
        let validator = LeadingZeroBytes::new(0);
        assert!(validator.is_valid(&Hash::new(&[0xff; 32])));
        assert!(validator.is_valid(&Hash::new(&[])));
    }

    #[test]
    fn test_leading_zero_bytes() {
        let validator = LeadingZeroBytes::new(2);
        assert!(validator.is_valid(&Hash::new(&[0, 0, 1, 2])));
        assert!(!validator.is_valid(&Hash::new(&[0, 1, 0, 0])));
        assert!(!validator.is_valid(&Hash::new(&[1, 0, 0, 0])));
    }

    #[test]
    fn test_short_hash_is_rejected() {
        let validator = LeadingZeroBytes::new(3);
        assert!(!validator.is_valid(&Hash::new(&[0, 0])));
    }

    #[test]
    fn test_closure_validator() {
        let validator = |hash: &Hash| hash.byte_at(0).map(|b| b < 0x80).unwrap_or(false);
        assert!(validator.is_valid(&Hash::new(&[0x10])));
        assert!(!validator.is_valid(&Hash::new(&[0x90])));
    }

    #[test]
    fn test_trait_object() {
        let boxed: Box<dyn HashValidator> = Box::new(LeadingZeroBytes::new(1));
        assert!(boxed.is_valid(&Hash::new(&[0, 9])));
    }
}
