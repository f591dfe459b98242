use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info};

use super::SharedSchedule;
use crate::blockchain::{BlockHasher, HybridBlock, Sha256Hasher, meets_difficulty};
use crate::error::ConsensusError;
use crate::transaction::ClientReq;

const PROGRESS_EVERY: u64 = 1 << 20;

/// A block whose nonce search succeeded. Only this type can be handed to
/// the sequential-work finalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedBlock(HybridBlock);

impl MinedBlock {
    pub fn block(&self) -> &HybridBlock {
        &self.0
    }

    pub fn pow_hash(&self) -> &str {
        // set by every constructor
        self.0.pow_hash.as_deref().unwrap_or_default()
    }

    pub fn into_inner(self) -> HybridBlock {
        self.0
    }
}

impl TryFrom<HybridBlock> for MinedBlock {
    type Error = ConsensusError;

    fn try_from(block: HybridBlock) -> Result<Self, Self::Error> {
        if block.pow_hash.is_none() {
            return Err(ConsensusError::MissingPowHash);
        }
        Ok(Self(block))
    }
}

/// Builds candidate blocks and searches for a nonce that meets the
/// scheduled difficulty.
pub struct PowEngine<H = Sha256Hasher> {
    hasher: Arc<H>,
    schedule: SharedSchedule,
    max_txs: usize,
}

impl<H> Clone for PowEngine<H> {
    fn clone(&self) -> Self {
        Self {
            hasher: Arc::clone(&self.hasher),
            schedule: self.schedule.clone(),
            max_txs: self.max_txs,
        }
    }
}

impl PowEngine<Sha256Hasher> {
    pub fn new(schedule: SharedSchedule, max_txs: usize) -> Self {
        Self::with_hasher(Sha256Hasher, schedule, max_txs)
    }
}

impl<H: BlockHasher> PowEngine<H> {
    pub fn with_hasher(hasher: H, schedule: SharedSchedule, max_txs: usize) -> Self {
        Self {
            hasher: Arc::new(hasher),
            schedule,
            max_txs,
        }
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn schedule(&self) -> &SharedSchedule {
        &self.schedule
    }

    pub fn max_txs(&self) -> usize {
        self.max_txs
    }

    /// Build the child of `prev` holding `transactions` and mine it at the
    /// difficulty scheduled for its height.
    pub fn propose(
        &self,
        prev: &HybridBlock,
        transactions: Vec<ClientReq>,
    ) -> Result<MinedBlock, ConsensusError> {
        self.propose_until(prev, transactions, &AtomicBool::new(false))
    }

    /// Like [`propose`](Self::propose), but gives up with
    /// [`ConsensusError::Cancelled`] once `cancel` is set.
    pub fn propose_until(
        &self,
        prev: &HybridBlock,
        transactions: Vec<ClientReq>,
        cancel: &AtomicBool,
    ) -> Result<MinedBlock, ConsensusError> {
        if transactions.len() > self.max_txs {
            return Err(ConsensusError::TooManyTransactions {
                count: transactions.len(),
                max: self.max_txs,
            });
        }

        let height = prev.height + 1;
        let difficulty = self.schedule.difficulty_at(height);
        let mut block =
            HybridBlock::new(height, Some(prev.block_hash.clone()), transactions, difficulty);

        info!(
            "PoW: mining block #{} with {} txs at difficulty {}",
            height,
            block.transactions.len(),
            difficulty
        );
        let started = Instant::now();
        let attempts = self.mine(&mut block, cancel)?;
        info!(
            "Block #{} mined! nonce={} hash={} attempts={} elapsed={:?}",
            height,
            block.nonce,
            block.block_hash,
            attempts,
            started.elapsed()
        );

        Ok(MinedBlock(block))
    }

    /// Nonce search starting at 0. Seals the block on success and returns
    /// the number of hashes tried.
    pub fn mine(
        &self,
        block: &mut HybridBlock,
        cancel: &AtomicBool,
    ) -> Result<u64, ConsensusError> {
        block.nonce = 0;
        let mut attempts = 0u64;
        loop {
            let hash = block.compute_pow_hash_with(&*self.hasher);
            attempts += 1;
            if meets_difficulty(&hash, block.difficulty) {
                block.seal_pow(hash);
                return Ok(attempts);
            }
            if cancel.load(Ordering::Relaxed) {
                debug!("PoW: block #{} abandoned after {} attempts", block.height, attempts);
                return Err(ConsensusError::Cancelled);
            }
            block.nonce = block.nonce.wrapping_add(1);
            if attempts % PROGRESS_EVERY == 0 {
                debug!("PoW: block #{} still mining, {} attempts", block.height, attempts);
            }
        }
    }
}
