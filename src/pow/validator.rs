use std::sync::Arc;

use log::debug;

use crate::blockchain::{BlockHasher, HybridBlock, Sha256Hasher, meets_difficulty};
use crate::error::PowRejection;

/// Stateless proof-of-work check: the seal matches the block contents and
/// meets the required difficulty.
pub struct PowValidator<H = Sha256Hasher> {
    hasher: Arc<H>,
}

impl<H> Clone for PowValidator<H> {
    fn clone(&self) -> Self {
        Self {
            hasher: Arc::clone(&self.hasher),
        }
    }
}

impl Default for PowValidator<Sha256Hasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl PowValidator<Sha256Hasher> {
    pub fn new() -> Self {
        Self::with_hasher(Sha256Hasher)
    }
}

impl<H: BlockHasher> PowValidator<H> {
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            hasher: Arc::new(hasher),
        }
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn validate(&self, block: &HybridBlock, required_difficulty: u32) -> bool {
        match self.check(block, required_difficulty) {
            Ok(()) => true,
            Err(reason) => {
                debug!("PoW rejected for block #{}: {reason}", block.height);
                false
            }
        }
    }

    /// The stored hash must equal the recomputed one, the recorded
    /// difficulty must not undercut `required_difficulty`, and the hash must
    /// carry the recorded number of leading zeros.
    pub fn check(&self, block: &HybridBlock, required_difficulty: u32) -> Result<(), PowRejection> {
        let stored = block.pow_hash.as_deref().ok_or(PowRejection::MissingPowHash)?;
        let computed = block.compute_pow_hash_with(&*self.hasher);
        if stored != computed {
            return Err(PowRejection::HashMismatch {
                stored: stored.to_string(),
                computed,
            });
        }
        if block.difficulty < required_difficulty {
            return Err(PowRejection::DifficultyBelowSchedule {
                recorded: block.difficulty,
                required: required_difficulty,
            });
        }
        if !meets_difficulty(&computed, block.difficulty) {
            return Err(PowRejection::TargetNotMet {
                difficulty: block.difficulty,
            });
        }
        Ok(())
    }
}
