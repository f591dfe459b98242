use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use crate::blockchain::{BlockHasher, HybridBlock, Sha256Hasher};
use crate::error::{ProofRejection, VdfError};
use crate::pow::MinedBlock;
use crate::vdf::{ProofVerifier, VdfEngine, VdfParameters};

/// How the VDF input is derived from a mined block. Producers and every
/// validator must use the same variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VdfInput {
    /// The proof-of-work hash alone.
    #[default]
    PowHash,
    /// `"{pow_hash}:{timestamp}"`, binding the delay to the block's time.
    PowHashWithTimestamp,
}

impl VdfInput {
    pub fn input_bytes(&self, pow_hash: &str, timestamp: i64) -> Vec<u8> {
        match self {
            VdfInput::PowHash => pow_hash.as_bytes().to_vec(),
            VdfInput::PowHashWithTimestamp => format!("{pow_hash}:{timestamp}").into_bytes(),
        }
    }

    /// `None` when the block was never mined.
    pub fn derive(&self, block: &HybridBlock) -> Option<Vec<u8>> {
        let pow_hash = block.pow_hash.as_deref()?;
        Some(self.input_bytes(pow_hash, block.timestamp))
    }
}

/// Turns a mined block into a finalized one by attaching a VDF proof.
#[derive(Debug, Clone)]
pub struct PoswFinalizer {
    engine: VdfEngine,
    input: VdfInput,
}

impl PoswFinalizer {
    pub fn new(params: Arc<VdfParameters>, input: VdfInput) -> Self {
        Self {
            engine: VdfEngine::new(params),
            input,
        }
    }

    pub fn engine(&self) -> &VdfEngine {
        &self.engine
    }

    pub fn finalize(&self, mined: MinedBlock) -> Result<HybridBlock, VdfError> {
        self.finalize_with(mined, &Sha256Hasher)
    }

    /// Runs the sequential squaring for the block's input; blocks the caller
    /// for the whole computation. `hasher` rehashes the finalized block.
    pub fn finalize_with<H: BlockHasher + ?Sized>(
        &self,
        mined: MinedBlock,
        hasher: &H,
    ) -> Result<HybridBlock, VdfError> {
        let started = Instant::now();
        let input = self.input.input_bytes(mined.pow_hash(), mined.block().timestamp);
        let proof = self.engine.compute(&input)?;

        let mut block = mined.into_inner();
        block.attach_proof_with(proof, hasher);
        info!(
            "PoSW: block #{} finalized in {:?} hash={}",
            block.height,
            started.elapsed(),
            block.block_hash
        );
        Ok(block)
    }
}

/// Checks the VDF proof carried by a finalized block.
#[derive(Debug, Clone)]
pub struct PoswValidator {
    verifier: ProofVerifier,
    input: VdfInput,
}

impl PoswValidator {
    pub fn new(params: Arc<VdfParameters>, input: VdfInput) -> Self {
        Self {
            verifier: ProofVerifier::new(params),
            input,
        }
    }

    pub fn verifier(&self) -> &ProofVerifier {
        &self.verifier
    }

    pub fn validate(&self, block: &HybridBlock) -> bool {
        match self.check(block) {
            Ok(()) => true,
            Err(reason) => {
                debug!("PoSW rejected for block #{}: {reason}", block.height);
                false
            }
        }
    }

    pub fn check(&self, block: &HybridBlock) -> Result<(), ProofRejection> {
        let proof = match &block.vdf_proof {
            Some(proof) if block.finalized => proof,
            _ => return Err(ProofRejection::MissingProof),
        };
        if block.time_parameter != proof.time_parameter() {
            return Err(ProofRejection::BlockTimeParameter {
                block: block.time_parameter,
                proof: proof.time_parameter(),
            });
        }
        let input = self.input.derive(block).ok_or(ProofRejection::MissingInput)?;
        self.verifier.check(&input, proof)
    }
}
