//! Snapshot iterators over the chain

use ledger_core::{Block, Transaction};
use std::sync::Arc;

/// Iterator over the blocks of a chain snapshot, genesis first
#[derive(Debug, Clone)]
pub struct Blocks {
    blocks: Arc<Vec<Block>>,
    position: usize,
}

impl Blocks {
    pub(crate) fn new(blocks: Arc<Vec<Block>>) -> Self {
        Self {
            blocks,
            position: 0,
        }
    }
}

impl Iterator for Blocks {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let block = self.blocks.get(self.position)?.clone();
        self.position += 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.blocks.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Blocks {}

/// Iterator over the transactions of a chain snapshot, genesis first
#[derive(Debug, Clone)]
pub struct Transactions {
    blocks: Blocks,
}

impl Transactions {
    pub(crate) fn new(blocks: Blocks) -> Self {
        Self { blocks }
    }
}

impl Iterator for Transactions {
    type Item = Transaction;

    fn next(&mut self) -> Option<Transaction> {
        self.blocks.next().map(|block| block.transaction().clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.blocks.size_hint()
    }
}

impl ExactSizeIterator for Transactions {}
