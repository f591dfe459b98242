use std::sync::Arc;

use log::warn;

use super::posw::PoswValidator;
use crate::blockchain::{BlockHasher, HybridBlock, Sha256Hasher};
use crate::error::Rejection;
use crate::pow::{PowValidator, SharedSchedule};
use crate::transaction::KeyRegistry;

/// Full block check: proof-of-work against the schedule first, then the
/// block hash, then transaction signatures when sender keys are known,
/// then the VDF proof. The expensive check runs last.
pub struct BlockValidator<H = Sha256Hasher> {
    pow: PowValidator<H>,
    posw: PoswValidator,
    schedule: SharedSchedule,
    keys: Option<Arc<KeyRegistry>>,
}

impl<H> Clone for BlockValidator<H> {
    fn clone(&self) -> Self {
        Self {
            pow: self.pow.clone(),
            posw: self.posw.clone(),
            schedule: self.schedule.clone(),
            keys: self.keys.clone(),
        }
    }
}

impl<H: BlockHasher> BlockValidator<H> {
    pub fn new(pow: PowValidator<H>, posw: PoswValidator, schedule: SharedSchedule) -> Self {
        Self {
            pow,
            posw,
            schedule,
            keys: None,
        }
    }

    /// Also require every transaction to carry a valid signature from a
    /// registered sender.
    pub fn with_keys(mut self, keys: KeyRegistry) -> Self {
        self.keys = Some(Arc::new(keys));
        self
    }

    pub fn keys(&self) -> Option<&KeyRegistry> {
        self.keys.as_deref()
    }

    pub fn pow(&self) -> &PowValidator<H> {
        &self.pow
    }

    pub fn posw(&self) -> &PoswValidator {
        &self.posw
    }

    pub fn validate(&self, block: &HybridBlock) -> bool {
        match self.check(block) {
            Ok(()) => true,
            Err(reason) => {
                warn!("Block #{} rejected: {reason}", block.height);
                false
            }
        }
    }

    pub fn check(&self, block: &HybridBlock) -> Result<(), Rejection> {
        let required = self.schedule.difficulty_at(block.height);
        self.pow.check(block, required)?;

        let computed = block.compute_hash_with(self.pow.hasher());
        if block.block_hash != computed {
            return Err(Rejection::BlockHashMismatch {
                stored: block.block_hash.clone(),
                computed,
            });
        }

        if let Some(keys) = &self.keys {
            block.validate_transactions(keys)?;
        }

        self.posw.check(block)?;
        Ok(())
    }

    /// `block` sits directly on top of `parent`.
    pub fn check_extends(
        &self,
        parent: &HybridBlock,
        block: &HybridBlock,
    ) -> Result<(), Rejection> {
        if block.height != parent.height + 1 {
            return Err(Rejection::WrongHeight {
                tip: parent.height,
                found: block.height,
            });
        }
        if block.prev_hash.as_deref() != Some(parent.block_hash.as_str()) {
            return Err(Rejection::WrongParent);
        }
        Ok(())
    }
}
