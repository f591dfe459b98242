//! Group arithmetic shared by the prover and the verifier.
//!
//! Both sides must derive challenges from byte-identical transcripts, so
//! every encoding used in a hash lives here and nowhere else.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use sha2::{Digest, Sha256};

use super::VdfParameters;

/// `SHA256(input) mod N`, as a signed group element.
pub fn hash_to_group(params: &VdfParameters, input: &[u8]) -> BigUint {
    let digest = Sha256::digest(input);
    to_signed(params, &BigUint::from_bytes_be(&digest))
}

/// Canonical representative of `{v, N - v}`: the one in `[0, (N-1)/2]`.
///
/// The signed group identifies `v` with `-v`, so a claimed output cannot be
/// replaced by its negation.
pub fn to_signed(params: &VdfParameters, value: &BigUint) -> BigUint {
    let modulus = params.modulus();
    let v = value % modulus;
    let negated = modulus - &v;
    if negated < v { negated } else { v }
}

/// `value` is the canonical representative of its class.
pub fn in_signed_range(params: &VdfParameters, value: &BigUint) -> bool {
    (value << 1u32) < *params.modulus()
}

/// Big-endian encoding left-padded to `width` bytes.
pub fn to_fixed_be(value: &BigUint, width: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= width {
        return bytes;
    }
    let mut out = vec![0u8; width - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}

/// Fiat-Shamir challenge `r = SHA256(x || T || y || mu) mod 2^lambda`.
///
/// Group elements are encoded at the modulus width and `T` as a big-endian
/// u64, so the transcript has a single byte representation.
pub fn challenge(
    params: &VdfParameters,
    x: &BigUint,
    t: u64,
    y: &BigUint,
    mu: &BigUint,
) -> BigUint {
    let width = params.element_width();
    let mut hasher = Sha256::new();
    hasher.update(to_fixed_be(x, width));
    hasher.update(t.to_be_bytes());
    hasher.update(to_fixed_be(y, width));
    hasher.update(to_fixed_be(mu, width));
    let r = BigUint::from_bytes_be(&hasher.finalize());
    r % (BigUint::one() << params.security_parameter())
}

/// Jacobi symbol `(a / n)` for odd `n`. Returns -1, 0 or 1.
pub fn jacobi(a: &BigUint, n: &BigUint) -> i8 {
    debug_assert!(n.is_odd());
    let mut a = a % n;
    let mut n = n.clone();
    let mut sign = 1i8;

    while !a.is_zero() {
        let twos = a.trailing_zeros().unwrap_or(0);
        if twos > 0 {
            a >>= twos;
            let n_mod_8 = low_bits(&n, 8);
            if twos % 2 == 1 && (n_mod_8 == 3 || n_mod_8 == 5) {
                sign = -sign;
            }
        }
        std::mem::swap(&mut a, &mut n);
        if low_bits(&a, 4) == 3 && low_bits(&n, 4) == 3 {
            sign = -sign;
        }
        a %= &n;
    }

    if n.is_one() { sign } else { 0 }
}

/// Membership in the signed quadratic residue group: non-negative (at most
/// `(N-1)/2`) with Jacobi symbol 1. For `N = 1 mod 4` the symbol of `-1` is
/// 1, so both signs of a square pass the Jacobi test.
pub fn is_signed_residue(params: &VdfParameters, value: &BigUint) -> bool {
    in_signed_range(params, value) && jacobi(value, params.modulus()) == 1
}

/// `x^(2^k)` in the signed group, by `k` sequential squarings.
pub fn square_times(params: &VdfParameters, x: &BigUint, k: u64) -> BigUint {
    let modulus = params.modulus();
    let mut y = x.clone();
    for _ in 0..k {
        y = (&y * &y) % modulus;
    }
    to_signed(params, &y)
}

/// Length of the next sub-claim: `ceil(t / 2)`.
pub fn half(t: u64) -> u64 {
    t.div_ceil(2)
}

/// Number of halving rounds before the claim reaches `T = 1`.
pub fn rounds(mut t: u64) -> usize {
    let mut n = 0;
    while t > 1 {
        t = half(t);
        n += 1;
    }
    n
}

/// One halving round: folds the claim `y = x^(2^t)` with midpoint `mu` into
/// the claim `y' = x'^(2^ceil(t/2))`.
///
/// For odd `t` the midpoint sits one squaring past the true middle, so `y`
/// is squared before it is folded in. Squaring drops the sign of `y`, which
/// is sound only because every value lives in the signed group.
pub fn fold(
    params: &VdfParameters,
    x: &BigUint,
    y: &BigUint,
    mu: &BigUint,
    t: u64,
) -> (BigUint, BigUint) {
    let modulus = params.modulus();
    let r = challenge(params, x, t, y, mu);

    let x_next = to_signed(params, &(x.modpow(&r, modulus) * mu));
    let y_base = if t.is_odd() { (y * y) % modulus } else { y.clone() };
    let y_next = to_signed(params, &(mu.modpow(&r, modulus) * y_base));
    (x_next, y_next)
}

fn low_bits(value: &BigUint, modulus: u32) -> u32 {
    (value % modulus).to_u32().unwrap_or(0)
}
