//! The block chain engine

use crate::account::BalanceChanges;
use crate::error::{BlockFault, ChainError, ChainResult};
use crate::iter::{Blocks, Transactions};
use crate::ledger::{Accounts, Ledger};
use crate::verify::{check_seal, verify_blocks};
use ledger_consensus::pow::{mine_block, mine_block_async};
use ledger_consensus::{HashValidator, MiningConfig};
use ledger_core::{Balance, Block, BlockIndex, Hash, Transaction};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Blocks and ledger, always mutated together under one lock
#[derive(Debug, Clone)]
struct ChainState {
    blocks: Arc<Vec<Block>>,
    ledger: Ledger,
}

impl ChainState {
    fn tail(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always holds the genesis block")
    }

    fn next_index(&self) -> ChainResult<BlockIndex> {
        BlockIndex::try_from(self.blocks.len())
            .map_err(|_| ChainError::CapacityExceeded(self.blocks.len()))
    }

    /// Run the five admission checks in order, touching nothing
    fn admission_check(
        &self,
        block: &Block,
        expected_index: BlockIndex,
        validator: &dyn HashValidator,
    ) -> Result<BalanceChanges, BlockFault> {
        if block.index() != expected_index {
            return Err(BlockFault::IndexOutOfSequence {
                expected: expected_index,
                actual: block.index(),
            });
        }

        let tail = self.tail();
        if block.previous_hash() != Some(tail.hash()) || !tail.has_consistent_hash() {
            return Err(BlockFault::BrokenLink);
        }

        check_seal(block, validator)?;
        self.ledger.check(block.transaction())
    }
}

/// Append-only chain of proof-of-work blocks with a running balance ledger.
///
/// Mutations (`append`, `remove_last`) take the write lock for their whole
/// check-and-apply step. Traversals take the read lock only long enough to
/// clone a snapshot handle, so they never observe a later mutation.
pub struct BlockChain {
    validator: Arc<dyn HashValidator>,
    config: MiningConfig,
    state: RwLock<ChainState>,
}

impl BlockChain {
    /// Create a chain under `validator`, mining its genesis block.
    ///
    /// Mining runs without a deadline; use [`BlockChain::with_validator`]
    /// to bound it.
    pub fn new<V: HashValidator + 'static>(validator: V) -> ChainResult<Self> {
        Self::with_validator(Arc::new(validator), MiningConfig::default())
    }

    /// Create a chain whose validator is the config's leading-zero policy
    pub fn from_config(config: MiningConfig) -> ChainResult<Self> {
        config.validate()?;
        let validator = Arc::new(config.validator());
        Self::with_validator(validator, config)
    }

    /// Create a chain with an explicit validator; `config` supplies the
    /// mining deadline, check interval and nonce bound.
    pub fn with_validator(
        validator: Arc<dyn HashValidator>,
        config: MiningConfig,
    ) -> ChainResult<Self> {
        let control = config.control(CancellationToken::new());
        let genesis = mine_block(0, Transaction::genesis(), None, validator.as_ref(), &control)?;
        info!("Created chain with genesis block {}", genesis.hash());

        Ok(Self {
            validator,
            config,
            state: RwLock::new(ChainState {
                blocks: Arc::new(vec![genesis]),
                ledger: Ledger::new(),
            }),
        })
    }

    /// Rehydrate a chain from stored blocks, re-verifying all of them
    pub fn from_blocks(
        validator: Arc<dyn HashValidator>,
        config: MiningConfig,
        blocks: Vec<Block>,
    ) -> ChainResult<Self> {
        let ledger = verify_blocks(&blocks, validator.as_ref())?;
        info!("Restored chain with {} blocks", blocks.len());

        Ok(Self {
            validator,
            config,
            state: RwLock::new(ChainState {
                blocks: Arc::new(blocks),
                ledger,
            }),
        })
    }

    /// The validator this chain admits blocks under
    pub fn validator(&self) -> &Arc<dyn HashValidator> {
        &self.validator
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Number of blocks, including genesis
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.state.read().blocks.len()
    }

    /// Hash of the last block
    pub fn tail_hash(&self) -> Hash {
        self.state.read().tail().hash().clone()
    }

    /// The last block
    pub fn tail(&self) -> Block {
        self.state.read().tail().clone()
    }

    /// Block at `index`
    pub fn block(&self, index: usize) -> Option<Block> {
        self.state.read().blocks.get(index).cloned()
    }

    /// Index and previous hash the next block must carry
    fn next_slot(&self) -> ChainResult<(BlockIndex, Hash)> {
        let state = self.state.read();
        Ok((state.next_index()?, state.tail().hash().clone()))
    }

    /// Mine `transaction` onto the current tail without changing the chain
    pub fn mine(&self, transaction: Transaction) -> ChainResult<Block> {
        self.mine_with(transaction, CancellationToken::new())
    }

    /// Like [`BlockChain::mine`], stopping early once `token` is cancelled
    pub fn mine_with(
        &self,
        transaction: Transaction,
        token: CancellationToken,
    ) -> ChainResult<Block> {
        let (index, previous_hash) = self.next_slot()?;
        debug!("Mining block #{} for {}", index, transaction);
        let control = self.config.control(token);
        Ok(mine_block(
            index,
            transaction,
            Some(previous_hash),
            self.validator.as_ref(),
            &control,
        )?)
    }

    /// Mine on the blocking thread pool; cancel `token` to abort
    pub async fn mine_async(
        &self,
        transaction: Transaction,
        token: CancellationToken,
    ) -> ChainResult<Block> {
        let (index, previous_hash) = self.next_slot()?;
        debug!("Mining block #{} for {} on worker", index, transaction);
        let control = self.config.control(token);
        Ok(mine_block_async(
            index,
            transaction,
            Some(previous_hash),
            Arc::clone(&self.validator),
            control,
        )
        .await?)
    }

    /// Admit `block` as the new tail.
    ///
    /// Checks index contiguity, linkage, hash integrity, proof of work and
    /// balances, in that order. On failure the chain is unchanged.
    pub fn append(&self, block: Block) -> ChainResult<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let expected = state.next_index()?;
        let changes = state
            .admission_check(&block, expected, self.validator.as_ref())
            .map_err(|fault| {
                warn!("Rejected block #{}: {}", block.index(), fault);
                ChainError::InvalidBlock {
                    index: block.index(),
                    fault,
                }
            })?;

        info!("Appended block #{} {}", block.index(), block.transaction());
        Arc::make_mut(&mut state.blocks).push(block);
        state.ledger.apply(&changes);
        Ok(())
    }

    /// Remove the tail block and undo its ledger effect.
    ///
    /// Returns `false` without change when only genesis remains.
    pub fn remove_last(&self) -> bool {
        let mut guard = self.state.write();
        let state = &mut *guard;

        if state.blocks.len() <= 1 {
            debug!("Refusing to remove the genesis block");
            return false;
        }
        let Some(removed) = Arc::make_mut(&mut state.blocks).pop() else {
            return false;
        };
        state
            .ledger
            .revert(&BalanceChanges::from_transaction(removed.transaction()));

        info!("Removed block #{} {}", removed.index(), removed.transaction());
        true
    }

    /// Current balance of `account`, 0 if it never appeared
    pub fn balance_of(&self, account: &str) -> Balance {
        self.state.read().ledger.balance_of(account)
    }

    /// Consistent copy of every account balance
    pub fn balances(&self) -> BTreeMap<String, Balance> {
        self.state.read().ledger.balances()
    }

    /// Re-verify the whole chain from genesis.
    ///
    /// Replays every block into a fresh ledger and then compares it with
    /// the maintained one.
    pub fn check(&self) -> ChainResult<()> {
        let snapshot = self.state.read().clone();
        let replayed = verify_blocks(&snapshot.blocks, self.validator.as_ref())?;

        let maintained = snapshot.ledger.balances();
        if replayed.balances() != maintained {
            warn!("Maintained ledger diverged from chain replay");
            return Err(ChainError::LedgerDiverged);
        }
        debug!("Verified chain of {} blocks", snapshot.blocks.len());
        Ok(())
    }

    /// Check if the whole chain re-verifies
    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    /// Account identifiers with a ledger entry, in sorted order
    pub fn accounts(&self) -> Accounts {
        self.state.read().ledger.accounts()
    }

    /// Blocks from genesis to tail
    pub fn blocks(&self) -> Blocks {
        Blocks::new(Arc::clone(&self.state.read().blocks))
    }

    /// Transactions from genesis to tail
    pub fn transactions(&self) -> Transactions {
        Transactions::new(self.blocks())
    }
}

impl fmt::Debug for BlockChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("BlockChain")
            .field("len", &state.blocks.len())
            .field("tail", &state.tail().hash())
            .field("accounts", &state.ledger.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckKind;
    use ledger_consensus::{CancelReason, ConsensusError, LeadingZeroBytes};
    use proptest::prelude::*;

    fn chain(difficulty: usize) -> BlockChain {
        BlockChain::new(LeadingZeroBytes::new(difficulty)).unwrap()
    }

    fn mine_and_append(chain: &BlockChain, tx: Transaction) -> Block {
        let block = chain.mine(tx).unwrap();
        chain.append(block.clone()).unwrap();
        block
    }

    fn flip(hash: &Hash, byte: usize) -> Hash {
        let mut bytes = hash.to_bytes();
        bytes[byte] ^= 0x01;
        Hash::from(bytes)
    }

    /// Overwrite the stored block at `index` behind the chain's back
    fn tamper(chain: &BlockChain, index: usize, block: Block) {
        let mut state = chain.state.write();
        Arc::make_mut(&mut state.blocks)[index] = block;
    }

    #[test]
    fn test_new_chain_holds_genesis() {
        let chain = chain(1);
        assert_eq!(chain.len(), 1);
        let genesis = chain.tail();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.hash().byte_at(0).unwrap(), 0);
        assert!(chain.is_valid());
        assert_eq!(chain.accounts().count(), 0);
    }

    #[test]
    fn test_mine_does_not_mutate() {
        let chain = chain(1);
        let a = chain.mine(Transaction::deposit("B", 100)).unwrap();
        let b = chain.mine(Transaction::deposit("B", 100)).unwrap();
        assert_eq!(a.nonce(), b.nonce());
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.index(), 1);
        assert_eq!(a.previous_hash(), Some(&chain.tail_hash()));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_append_updates_ledger() {
        let chain = chain(1);
        mine_and_append(&chain, Transaction::deposit("B", 100));
        mine_and_append(&chain, Transaction::new("B", "C", 30));

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.balance_of("B"), 70);
        assert_eq!(chain.balance_of("C"), 30);
        assert_eq!(chain.accounts().collect::<Vec<_>>(), vec!["B", "C"]);
        assert!(chain.check().is_ok());
    }

    #[test]
    fn test_append_rejects_wrong_index() {
        let chain = chain(0);
        let block = chain.mine(Transaction::deposit("B", 1)).unwrap();
        chain.append(block.clone()).unwrap();

        let err = chain.append(block).unwrap_err();
        assert!(matches!(
            err,
            ChainError::InvalidBlock {
                index: 1,
                fault: BlockFault::IndexOutOfSequence {
                    expected: 2,
                    actual: 1
                }
            }
        ));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_append_rejects_broken_link() {
        let chain = chain(0);
        let block = Block::new(1, Transaction::deposit("B", 1), Some(Hash::new(&[0u8; 32])), 0);
        let err = chain.append(block).unwrap_err();
        assert_eq!(err.check(), Some(CheckKind::Linkage));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_append_rejects_forged_hash() {
        let chain = chain(1);
        let mined = chain.mine(Transaction::deposit("B", 5)).unwrap();
        let forged = Block::from_parts(
            mined.index(),
            Transaction::deposit("B", 500),
            mined.previous_hash().cloned(),
            mined.nonce(),
            mined.hash().clone(),
        );
        let err = chain.append(forged).unwrap_err();
        assert_eq!(err.check(), Some(CheckKind::HashIntegrity));
        assert_eq!(chain.balance_of("B"), 0);
    }

    #[test]
    fn test_append_rejects_insufficient_work() {
        let chain = chain(2);
        let weak = Block::new(1, Transaction::deposit("B", 5), Some(chain.tail_hash()), 0);
        let err = chain.append(weak).unwrap_err();
        assert_eq!(err.check(), Some(CheckKind::ProofOfWork));
    }

    #[test]
    fn test_append_rejects_overdraft_and_negative_amount() {
        let chain = chain(0);
        mine_and_append(&chain, Transaction::deposit("B", 10));

        let overdraft = chain.mine(Transaction::new("B", "C", 11)).unwrap();
        let err = chain.append(overdraft).unwrap_err();
        assert!(matches!(
            err,
            ChainError::InvalidBlock {
                fault: BlockFault::Overdrawn { .. },
                ..
            }
        ));

        let negative = chain.mine(Transaction::new("C", "B", -5)).unwrap();
        let err = chain.append(negative).unwrap_err();
        assert!(matches!(
            err,
            ChainError::InvalidBlock {
                fault: BlockFault::NegativeAmount(-5),
                ..
            }
        ));

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.balance_of("B"), 10);
        assert!(chain.is_valid());
    }

    #[test]
    fn test_self_transfer_is_accepted() {
        let chain = chain(0);
        mine_and_append(&chain, Transaction::deposit("B", 1));
        mine_and_append(&chain, Transaction::new("B", "B", 50));
        assert_eq!(chain.balance_of("B"), 1);
        assert!(chain.is_valid());

        assert!(chain.remove_last());
        assert_eq!(chain.balance_of("B"), 1);
    }

    #[test]
    fn test_remove_last_restores_state() {
        let chain = chain(1);
        mine_and_append(&chain, Transaction::deposit("B", 100));
        let tail = chain.tail_hash();
        let balances = chain.balances();

        mine_and_append(&chain, Transaction::new("B", "C", 30));
        assert!(chain.remove_last());

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.tail_hash(), tail);
        assert_eq!(chain.balances(), balances);
        assert_eq!(chain.accounts().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn test_genesis_is_never_removed() {
        let chain = chain(0);
        assert!(!chain.remove_last());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_iterators_are_snapshots() {
        let chain = chain(0);
        mine_and_append(&chain, Transaction::deposit("B", 3));

        let blocks = chain.blocks();
        let transactions = chain.transactions();
        let accounts = chain.accounts();
        mine_and_append(&chain, Transaction::new("B", "C", 1));
        assert!(chain.remove_last());
        assert!(chain.remove_last());

        assert_eq!(blocks.count(), 2);
        assert_eq!(
            transactions.collect::<Vec<_>>(),
            vec![Transaction::genesis(), Transaction::deposit("B", 3)]
        );
        assert_eq!(accounts.collect::<Vec<_>>(), vec!["B"]);
        assert_eq!(chain.blocks().count(), 1);
    }

    #[test]
    fn test_tampered_tail_hash() {
        let chain = chain(1);
        mine_and_append(&chain, Transaction::deposit("B", 100));
        let tail = chain.tail();
        tamper(
            &chain,
            1,
            Block::from_parts(
                tail.index(),
                tail.transaction().clone(),
                tail.previous_hash().cloned(),
                tail.nonce(),
                flip(tail.hash(), 31),
            ),
        );

        assert!(matches!(
            chain.check(),
            Err(ChainError::Verification { index: 1, .. })
        ));

        let next = chain.mine(Transaction::new("B", "C", 1)).unwrap();
        let err = chain.append(next).unwrap_err();
        assert_eq!(err.check(), Some(CheckKind::Linkage));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_tampered_previous_hash_and_nonce() {
        let chain = chain(0);
        mine_and_append(&chain, Transaction::deposit("B", 100));
        mine_and_append(&chain, Transaction::new("B", "C", 10));
        let original = chain.block(1).unwrap();

        let previous = flip(original.previous_hash().unwrap(), 0);
        tamper(
            &chain,
            1,
            Block::from_parts(
                1,
                original.transaction().clone(),
                Some(previous),
                original.nonce(),
                original.hash().clone(),
            ),
        );
        assert!(matches!(
            chain.check(),
            Err(ChainError::Verification { index: 1, .. })
        ));

        tamper(
            &chain,
            1,
            Block::from_parts(
                1,
                original.transaction().clone(),
                original.previous_hash().cloned(),
                original.nonce() ^ 1,
                original.hash().clone(),
            ),
        );
        assert!(!chain.is_valid());

        tamper(&chain, 1, original);
        assert!(chain.is_valid());
    }

    #[test]
    fn test_tampered_ledger_is_detected() {
        let chain = chain(0);
        mine_and_append(&chain, Transaction::deposit("B", 100));
        chain
            .state
            .write()
            .ledger
            .admit(&Transaction::deposit("X", 1))
            .unwrap();

        assert!(matches!(chain.check(), Err(ChainError::LedgerDiverged)));
    }

    #[test]
    fn test_mining_cancelled() {
        let chain = BlockChain::new(|hash: &Hash| hash.leading_zero_bytes() >= 1).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = chain
            .mine_with(Transaction::deposit("B", 1), token)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.cancel_reason(), Some(CancelReason::Cancelled));
    }

    #[test]
    fn test_mining_exhausted() {
        let genesis = Block::genesis(0);
        let genesis_hash = genesis.hash().clone();
        let only_genesis: Arc<dyn HashValidator> =
            Arc::new(move |hash: &Hash| hash == &genesis_hash);

        let chain = BlockChain::from_blocks(
            only_genesis,
            MiningConfig::new(0).with_max_nonce(10),
            vec![genesis],
        )
        .unwrap();
        assert_eq!(chain.len(), 1);

        let err = chain.mine(Transaction::deposit("B", 1)).unwrap_err();
        assert!(err.is_exhausted());
        assert!(matches!(
            err,
            ChainError::Mining(ConsensusError::ProofOfWorkExhausted { max_nonce: 10 })
        ));
    }

    #[test]
    fn test_from_config_validates() {
        assert!(BlockChain::from_config(MiningConfig::new(33)).is_err());
        let chain = BlockChain::from_config(MiningConfig::new(1)).unwrap();
        assert_eq!(chain.tail().hash().byte_at(0).unwrap(), 0);
    }

    #[test]
    fn test_from_blocks_rejects_tampering() {
        let chain = chain(0);
        mine_and_append(&chain, Transaction::deposit("B", 2));
        let mut blocks: Vec<Block> = chain.blocks().collect();
        blocks.push(Block::new(2, Transaction::new("B", "C", 3), Some(blocks[1].hash().clone()), 0));

        let err = BlockChain::from_blocks(chain.validator().clone(), MiningConfig::new(0), blocks)
            .unwrap_err();
        assert!(matches!(
            err,
            ChainError::Verification {
                index: 2,
                fault: BlockFault::Overdrawn { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_mine_async() {
        let chain = chain(1);
        let block = chain
            .mine_async(Transaction::deposit("B", 9), CancellationToken::new())
            .await
            .unwrap();
        chain.append(block).unwrap();
        assert_eq!(chain.balance_of("B"), 9);
    }

    #[derive(Debug, Clone, Copy)]
    enum TailField {
        Hash,
        PreviousHash,
        Nonce,
    }

    /// Copy of `block` with one byte of `field` xored with `mask`
    fn corrupt(block: &Block, field: TailField, byte: usize, mask: u8) -> Block {
        let xor = |hash: &Hash| {
            let mut bytes = hash.to_bytes();
            let position = byte % bytes.len();
            bytes[position] ^= mask;
            Hash::from(bytes)
        };
        let mut previous_hash = block.previous_hash().cloned();
        let mut nonce = block.nonce();
        let mut hash = block.hash().clone();
        match field {
            TailField::Hash => hash = xor(&hash),
            TailField::PreviousHash => previous_hash = previous_hash.as_ref().map(xor),
            TailField::Nonce => nonce ^= u64::from(mask) << (8 * (byte % 8)),
        }
        Block::from_parts(
            block.index(),
            block.transaction().clone(),
            previous_hash,
            nonce,
            hash,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_corrupted_tail_fails_check_and_blocks_append(
            field in prop_oneof![
                Just(TailField::Hash),
                Just(TailField::PreviousHash),
                Just(TailField::Nonce),
            ],
            byte in 0..32usize,
            mask in 1..=u8::MAX,
        ) {
            let chain = chain(0);
            mine_and_append(&chain, Transaction::deposit("B", 100));
            mine_and_append(&chain, Transaction::new("B", "C", 40));
            let tail = chain.tail();
            tamper(&chain, 2, corrupt(&tail, field, byte, mask));

            let verified = chain.check();
            prop_assert!(
                matches!(verified, Err(ChainError::Verification { index: 2, .. })),
                "unexpected check result: {:?}",
                verified
            );

            let next = chain.mine(Transaction::new("C", "B", 1)).unwrap();
            let err = chain.append(next).unwrap_err();
            prop_assert_eq!(err.check(), Some(CheckKind::Linkage));
            prop_assert_eq!(chain.len(), 3);
            prop_assert_eq!(chain.balance_of("C"), 40);
        }
    }
}
