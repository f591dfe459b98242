//! Pietrzak verifiable delay function over an RSA group.
//!
//! `VdfEngine` evaluates `y = x^(2^T) mod N` by sequential squaring and
//! proves it by recursive halving: each round publishes the midpoint
//! `mu = x^(2^ceil(T/2))`, derives a Fiat-Shamir challenge `r` from the
//! round transcript and folds `(x, y)` into `(x^r * mu, mu^r * y)`, which
//! is a claim of half the length. `ProofVerifier` replays the folds in
//! O(log T) exponentiations. Midpoints are constrained to the signed
//! quadratic residue group (Jacobi symbol 1).

pub mod arith;
pub mod engine;
pub mod params;
pub mod proof;
pub mod verifier;

pub use engine::VdfEngine;
pub use params::{DEFAULT_SECURITY_PARAMETER, DEFAULT_TIME_PARAMETER, VdfParameters};
pub use proof::SequentialProof;
pub use verifier::ProofVerifier;

/// Small parameters for fast tests: N = (2^61 - 1)(2^89 - 1).
#[cfg(test)]
pub(crate) fn test_params(time_parameter: u64) -> VdfParameters {
    use num_bigint::BigUint;
    use num_traits::One;

    let p = (BigUint::one() << 61u32) - 1u32;
    let q = (BigUint::one() << 89u32) - 1u32;
    VdfParameters::new(p * q, time_parameter, DEFAULT_SECURITY_PARAMETER)
        .expect("valid test modulus")
}
