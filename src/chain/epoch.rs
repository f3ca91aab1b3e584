use std::sync::Arc;

use bitcoin::{Block, BlockHash};

/// One best-block announcement from the chain backend.
///
/// The block itself is shared behind an [`Arc`] because every beat forked for
/// a consumer carries the same epoch; cloning an epoch never copies the
/// block.
#[derive(Clone, Debug)]
pub struct BlockEpoch {
    /// Height of the block in the best chain.
    pub height: i32,
    /// Hash of the block.
    pub hash: BlockHash,
    /// The full block, including all confirmed transactions.
    pub block: Arc<Block>,
}

impl BlockEpoch {
    /// Creates an epoch from its parts.
    pub fn new(height: i32, hash: BlockHash, block: Arc<Block>) -> Self {
        Self {
            height,
            hash,
            block,
        }
    }

    /// Creates an epoch from a block, computing its hash.
    pub fn from_block(height: i32, block: Block) -> Self {
        let hash = block.block_hash();
        Self {
            height,
            hash,
            block: Arc::new(block),
        }
    }
}
