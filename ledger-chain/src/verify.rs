//! Block checks shared by admission and full-chain verification

use crate::error::{BlockFault, ChainError, ChainResult};
use crate::ledger::Ledger;
use ledger_consensus::HashValidator;
use ledger_core::{Block, BlockIndex, Hash};
use tracing::{debug, warn};

/// Check a block's own seal: stored hash matches contents and the
/// validator accepts it.
pub(crate) fn check_seal(block: &Block, validator: &dyn HashValidator) -> Result<(), BlockFault> {
    let computed = block.compute_hash();
    if &computed != block.hash() {
        return Err(BlockFault::HashMismatch {
            stored: block.hash().clone(),
            computed,
        });
    }
    if !validator.is_valid(block.hash()) {
        return Err(BlockFault::ProofOfWork(block.hash().clone()));
    }
    Ok(())
}

/// Check position, linkage and seal of `block` against its predecessor
pub(crate) fn check_successor(
    block: &Block,
    expected_index: BlockIndex,
    previous_hash: &Hash,
    validator: &dyn HashValidator,
) -> Result<(), BlockFault> {
    if block.index() != expected_index {
        return Err(BlockFault::IndexOutOfSequence {
            expected: expected_index,
            actual: block.index(),
        });
    }
    if block.previous_hash() != Some(previous_hash) {
        return Err(BlockFault::BrokenLink);
    }
    check_seal(block, validator)
}

/// Check that `block` is a correctly sealed genesis block
pub(crate) fn check_genesis(block: &Block, validator: &dyn HashValidator) -> Result<(), BlockFault> {
    if !block.is_genesis() {
        return Err(BlockFault::MalformedGenesis);
    }
    check_seal(block, validator)
}

/// Re-verify a whole chain from genesis.
///
/// Recomputes every hash, linkage and proof of work and replays every
/// transaction into a fresh ledger, stopping at the first fault. Returns
/// the replayed ledger on success.
pub fn verify_blocks(blocks: &[Block], validator: &dyn HashValidator) -> ChainResult<Ledger> {
    let fail = |index: usize, fault: BlockFault| {
        warn!("Chain verification failed at block #{}: {}", index, fault);
        ChainError::Verification { index, fault }
    };

    let genesis = blocks
        .first()
        .ok_or_else(|| fail(0, BlockFault::MissingGenesis))?;
    check_genesis(genesis, validator).map_err(|fault| fail(0, fault))?;

    let mut ledger = Ledger::new();
    for (position, pair) in blocks.windows(2).enumerate() {
        let (previous, block) = (&pair[0], &pair[1]);
        let index = position + 1;
        let expected = BlockIndex::try_from(index).map_err(|_| ChainError::CapacityExceeded(index))?;

        check_successor(block, expected, previous.hash(), validator)
            .and_then(|()| ledger.admit(block.transaction()))
            .map_err(|fault| fail(index, fault))?;
        debug!("Verified block #{}", index);
    }

    Ok(ledger)
}
