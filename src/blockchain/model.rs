use log::debug;

use super::HybridBlock;
use crate::error::ChainError;

/// Accepted chain history: an append-only sequence of finalized blocks on
/// top of genesis.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<HybridBlock>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// Initialize a new chain with a genesis block.
    pub fn new() -> Self {
        Self::with_genesis(HybridBlock::genesis())
    }

    pub fn with_genesis(genesis: HybridBlock) -> Self {
        Self {
            blocks: vec![genesis],
        }
    }

    /// Return the last block in the chain.
    pub fn tip(&self) -> &HybridBlock {
        // never empty: constructed with genesis, append-only
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn height(&self) -> u64 {
        self.tip().height
    }

    pub fn blocks(&self) -> &[HybridBlock] {
        &self.blocks
    }

    /// The newest `n` blocks (fewer if the chain is shorter), oldest first.
    pub fn recent(&self, n: usize) -> &[HybridBlock] {
        let start = self.blocks.len().saturating_sub(n);
        &self.blocks[start..]
    }

    /// Append a block that extends the tip. Proof validation is the
    /// caller's job; this only guards linkage and finality.
    pub fn append(&mut self, block: HybridBlock) -> Result<(), ChainError> {
        let tip = self.tip();
        if block.height != tip.height + 1 {
            return Err(ChainError::HeightMismatch {
                tip: tip.height,
                found: block.height,
            });
        }
        if block.prev_hash.as_deref() != Some(tip.block_hash.as_str()) {
            return Err(ChainError::BrokenLink);
        }
        if !block.is_finalized() {
            return Err(ChainError::NotFinalized);
        }
        debug!("chain: appended block #{} ({})", block.height, block.block_hash);
        self.blocks.push(block);
        Ok(())
    }

    /// Linkage and height continuity over the whole history.
    pub fn is_linked(&self) -> bool {
        let genesis = &self.blocks[0];
        if !genesis.is_genesis() {
            return false;
        }
        self.blocks.windows(2).all(|pair| {
            let (prev, current) = (&pair[0], &pair[1]);
            current.height == prev.height + 1
                && current.prev_hash.as_deref() == Some(prev.block_hash.as_str())
        })
    }
}
