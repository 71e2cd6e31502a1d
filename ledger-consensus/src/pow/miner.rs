//! Nonce search with cooperative cancellation

use crate::error::CancelReason;
use crate::traits::HashValidator;
use crate::{ConsensusError, ConsensusResult};
use ledger_core::{Block, BlockHasher, BlockIndex, Hash, Nonce, Transaction};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default number of attempts between cancellation checks
pub const DEFAULT_CHECK_INTERVAL: u64 = 4096;

/// External controls for a nonce search
#[derive(Debug, Clone)]
pub struct MiningControl {
    token: CancellationToken,
    deadline: Option<Instant>,
    check_interval: u64,
    max_nonce: Nonce,
}

impl Default for MiningControl {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl MiningControl {
    /// Search the full nonce space until `token` is cancelled
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
            max_nonce: Nonce::MAX,
        }
    }

    /// Stop the search once `deadline` has passed
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Check for cancellation every `interval` attempts (at least 1)
    pub fn with_check_interval(mut self, interval: u64) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    /// Try nonces only up to and including `max_nonce`
    pub fn with_max_nonce(mut self, max_nonce: Nonce) -> Self {
        self.max_nonce = max_nonce;
        self
    }

    fn stop_reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineElapsed),
            _ => None,
        }
    }
}

/// Find the first nonce, counting up from 0, whose block hash `validator`
/// accepts. Runs until found or the nonce space is exhausted.
pub fn mine<V: HashValidator + ?Sized>(
    index: BlockIndex,
    transaction: &Transaction,
    previous_hash: Option<&Hash>,
    validator: &V,
) -> ConsensusResult<Nonce> {
    mine_with(
        index,
        transaction,
        previous_hash,
        validator,
        &MiningControl::default(),
    )
}

/// Like [`mine`], checking `control` for cancellation and deadline
pub fn mine_with<V: HashValidator + ?Sized>(
    index: BlockIndex,
    transaction: &Transaction,
    previous_hash: Option<&Hash>,
    validator: &V,
    control: &MiningControl,
) -> ConsensusResult<Nonce> {
    let hasher = BlockHasher::new(index, transaction, previous_hash);
    let mut nonce: Nonce = 0;

    loop {
        if nonce % control.check_interval == 0 {
            if let Some(reason) = control.stop_reason() {
                warn!("Mining block #{} {} after {} attempts", index, reason, nonce);
                return Err(ConsensusError::MiningCancelled {
                    reason,
                    attempts: nonce,
                });
            }
            trace!(index, nonce, "mining progress");
        }

        if validator.is_valid(&hasher.hash_with_nonce(nonce)) {
            debug!("Mined block #{} with nonce {}", index, nonce);
            return Ok(nonce);
        }

        if nonce == control.max_nonce {
            warn!("Nonce space exhausted for block #{}", index);
            return Err(ConsensusError::ProofOfWorkExhausted {
                max_nonce: control.max_nonce,
            });
        }
        nonce += 1;
    }
}

/// Mine a nonce and build the resulting block
pub fn mine_block<V: HashValidator + ?Sized>(
    index: BlockIndex,
    transaction: Transaction,
    previous_hash: Option<Hash>,
    validator: &V,
    control: &MiningControl,
) -> ConsensusResult<Block> {
    let nonce = mine_with(index, &transaction, previous_hash.as_ref(), validator, control)?;
    Ok(Block::new(index, transaction, previous_hash, nonce))
}

/// Run [`mine_block`] on the blocking thread pool.
///
/// Dropping the returned future does not stop the search; cancel the
/// control's token for that.
pub async fn mine_block_async(
    index: BlockIndex,
    transaction: Transaction,
    previous_hash: Option<Hash>,
    validator: Arc<dyn HashValidator>,
    control: MiningControl,
) -> ConsensusResult<Block> {
    tokio::task::spawn_blocking(move || {
        mine_block(index, transaction, previous_hash, validator.as_ref(), &control)
    })
    .await?
}
