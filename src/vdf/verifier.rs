use std::sync::Arc;

use log::debug;

use super::arith::{fold, half, hash_to_group, in_signed_range, is_signed_residue, to_signed};
use super::{SequentialProof, VdfParameters};
use crate::error::ProofRejection;

/// Checks a claimed VDF output in O(log T) group operations.
#[derive(Debug, Clone)]
pub struct ProofVerifier {
    params: Arc<VdfParameters>,
}

impl ProofVerifier {
    pub fn new(params: Arc<VdfParameters>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &VdfParameters {
        &self.params
    }

    /// Accept/reject. Rejections are logged at debug level; use [`check`]
    /// for the reason.
    ///
    /// [`check`]: ProofVerifier::check
    pub fn verify(&self, input: &[u8], proof: &SequentialProof) -> bool {
        match self.check(input, proof) {
            Ok(()) => true,
            Err(reason) => {
                debug!("VDF proof rejected: {reason}");
                false
            }
        }
    }

    /// Replays the halving rounds with the prover's midpoints until the
    /// claim has length 1, then checks that single squaring directly.
    pub fn check(&self, input: &[u8], proof: &SequentialProof) -> Result<(), ProofRejection> {
        let params = &*self.params;
        let expected_t = params.time_parameter();
        if proof.time_parameter() != expected_t {
            return Err(ProofRejection::TimeParameterMismatch {
                expected: expected_t,
                found: proof.time_parameter(),
            });
        }
        if !in_signed_range(params, proof.output()) {
            return Err(ProofRejection::OutputOutOfRange);
        }

        let elements = proof.proof_elements();
        let mut x = hash_to_group(params, input);
        let mut y = proof.output().clone();
        let mut t = expected_t;
        let mut index = 0;

        while t > 1 {
            let mu = elements
                .get(index)
                .ok_or(ProofRejection::ProofTooShort { len: elements.len() })?;
            if !in_signed_range(params, mu) {
                return Err(ProofRejection::ElementOutOfRange { index });
            }
            if !is_signed_residue(params, mu) {
                return Err(ProofRejection::NotResidue { index });
            }

            let (x_next, y_next) = fold(params, &x, &y, mu, t);
            x = x_next;
            y = y_next;
            t = half(t);
            index += 1;
        }

        if index < elements.len() {
            return Err(ProofRejection::ProofTooLong {
                extra: elements.len() - index,
            });
        }
        if to_signed(params, &(&x * &x)) != y {
            return Err(ProofRejection::OutputMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use num_bigint::BigUint;

    use super::ProofVerifier;
    use crate::error::ProofRejection;
    use crate::vdf::arith::{hash_to_group, to_signed};
    use crate::vdf::{SequentialProof, VdfEngine, test_params};

    fn setup(t: u64) -> (VdfEngine, ProofVerifier) {
        let params = Arc::new(test_params(t));
        (VdfEngine::new(params.clone()), ProofVerifier::new(params))
    }

    fn rebuild(
        proof: &SequentialProof,
        output: BigUint,
        elements: Vec<BigUint>,
    ) -> SequentialProof {
        SequentialProof::from_parts(output, elements, proof.time_parameter(), proof.created_at())
    }

    #[test]
    fn accepts_honest_proofs_for_any_t() {
        for t in [1u64, 2, 3, 5, 7, 16, 17, 100] {
            let (engine, verifier) = setup(t);
            let proof = engine.compute(b"abc").unwrap();
            assert_eq!(verifier.check(b"abc", &proof), Ok(()), "T = {t}");
        }
    }

    #[test]
    fn abc_with_t16_has_four_elements_and_rejects_flipped_output() {
        let (engine, verifier) = setup(16);
        let proof = engine.compute(b"abc").unwrap();
        assert_eq!(proof.proof_elements().len(), 4);
        assert!(verifier.verify(b"abc", &proof));

        let flipped = rebuild(
            &proof,
            proof.output() ^ BigUint::from(1u32),
            proof.proof_elements().to_vec(),
        );
        assert!(!verifier.verify(b"abc", &flipped));
    }

    #[test]
    fn rejects_negated_output_with_a_matching_proof() {
        for t in [3u64, 6, 17, 100] {
            let (engine, verifier) = setup(t);
            let honest = engine.compute(b"abc").unwrap();
            let x = hash_to_group(verifier.params(), b"abc");
            let negated = verifier.params().modulus() - honest.output();
            let elements = engine.prove(&x, &negated, t).unwrap();
            let forged = SequentialProof::new(negated, elements, t);
            assert_eq!(
                verifier.check(b"abc", &forged),
                Err(ProofRejection::OutputOutOfRange),
                "T = {t}"
            );
        }
    }

    #[test]
    fn rejects_wrong_input() {
        let (engine, verifier) = setup(16);
        let proof = engine.compute(b"abc").unwrap();
        assert!(!verifier.verify(b"abd", &proof));
    }

    #[test]
    fn rejects_any_tampered_element() {
        let (engine, verifier) = setup(16);
        let proof = engine.compute(b"abc").unwrap();

        for i in 0..proof.proof_elements().len() {
            let mut elements = proof.proof_elements().to_vec();
            // still a canonical residue, so only the transcript catches it
            elements[i] = to_signed(verifier.params(), &(&elements[i] * &elements[i]));
            let tampered = rebuild(&proof, proof.output().clone(), elements);
            assert!(!verifier.verify(b"abc", &tampered), "element {i}");
        }
    }

    #[test]
    fn rejects_structural_defects() {
        let (engine, verifier) = setup(16);
        let proof = engine.compute(b"abc").unwrap();
        let elements = proof.proof_elements().to_vec();

        let short = rebuild(&proof, proof.output().clone(), elements[..3].to_vec());
        assert_eq!(
            verifier.check(b"abc", &short),
            Err(ProofRejection::ProofTooShort { len: 3 })
        );

        let mut long_elements = elements.clone();
        long_elements.push(BigUint::from(4u32));
        let long = rebuild(&proof, proof.output().clone(), long_elements);
        assert_eq!(
            verifier.check(b"abc", &long),
            Err(ProofRejection::ProofTooLong { extra: 1 })
        );

        let mut unreduced = elements.clone();
        unreduced[0] = verifier.params().modulus() + 1u32;
        let unreduced = rebuild(&proof, proof.output().clone(), unreduced);
        assert_eq!(
            verifier.check(b"abc", &unreduced),
            Err(ProofRejection::ElementOutOfRange { index: 0 })
        );

        let mut zero = elements;
        zero[2] = BigUint::from(0u32);
        let zero = rebuild(&proof, proof.output().clone(), zero);
        assert_eq!(
            verifier.check(b"abc", &zero),
            Err(ProofRejection::NotResidue { index: 2 })
        );
    }

    #[test]
    fn rejects_changed_time_parameter() {
        let (engine, verifier) = setup(16);
        let proof = engine.compute(b"abc").unwrap();
        let relabelled = SequentialProof::from_parts(
            proof.output().clone(),
            proof.proof_elements().to_vec(),
            17,
            proof.created_at(),
        );
        assert_eq!(
            verifier.check(b"abc", &relabelled),
            Err(ProofRejection::TimeParameterMismatch {
                expected: 16,
                found: 17
            })
        );
    }
}
