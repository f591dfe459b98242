use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use num_bigint::BigUint;

use super::arith::{fold, half, hash_to_group, is_signed_residue, rounds, square_times, to_signed};
use super::{SequentialProof, VdfParameters};
use crate::error::VdfError;

/// Squarings between progress log lines.
const PROGRESS_EVERY: u64 = 1_000_000;

/// Computes `y = x^(2^T) mod N` and its Pietrzak proof.
///
/// Holds no mutable state: every call works on its own scratch values, so
/// one engine may serve concurrent computations for different inputs.
#[derive(Debug, Clone)]
pub struct VdfEngine {
    params: Arc<VdfParameters>,
}

impl VdfEngine {
    pub fn new(params: Arc<VdfParameters>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &VdfParameters {
        &self.params
    }

    /// Evaluate the VDF on `input` and prove the result.
    ///
    /// Blocks for time proportional to T sequential modular squarings
    /// (plus about T more to build the proof).
    pub fn compute(&self, input: &[u8]) -> Result<SequentialProof, VdfError> {
        let t = self.params.time_parameter();
        let started = Instant::now();

        let x = hash_to_group(&self.params, input);
        let y = self.evaluate(&x, t);
        let proof_elements = self.prove(&x, &y, t)?;

        info!(
            "VDF solved: T={} proof_elements={} elapsed={:.3}ms",
            t,
            proof_elements.len(),
            started.elapsed().as_secs_f64() * 1e3
        );
        Ok(SequentialProof::new(y, proof_elements, t))
    }

    /// Sequential squaring with periodic progress logs. The result is the
    /// signed-group representative.
    pub fn evaluate(&self, x: &BigUint, t: u64) -> BigUint {
        let modulus = self.params.modulus();
        let mut y = x.clone();
        for i in 0..t {
            y = (&y * &y) % modulus;
            if i > 0 && i % PROGRESS_EVERY == 0 {
                debug!("VDF progress: {}%", i * 100 / t);
            }
        }
        to_signed(&self.params, &y)
    }

    /// Recursive halving: each round publishes the midpoint of the current
    /// claim and folds both halves into one claim of half the length.
    pub(crate) fn prove(&self, x: &BigUint, y: &BigUint, t: u64) -> Result<Vec<BigUint>, VdfError> {
        let mut proof = Vec::with_capacity(rounds(t));
        let mut xi = x.clone();
        let mut yi = y.clone();
        let mut ti = t;

        while ti > 1 {
            let half_t = half(ti);
            let mu = square_times(&self.params, &xi, half_t);
            if !is_signed_residue(&self.params, &mu) {
                return Err(VdfError::NonResidueProofElement { round: proof.len() });
            }

            let (x_next, y_next) = fold(&self.params, &xi, &yi, &mu, ti);
            proof.push(mu);
            xi = x_next;
            yi = y_next;
            ti = half_t;
        }
        Ok(proof)
    }
}
