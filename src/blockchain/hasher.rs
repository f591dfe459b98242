use sha2::{Digest, Sha256};

/// Hash function behind block and proof-of-work hashes. Producers and
/// validators must agree on it.
pub trait BlockHasher: Send + Sync {
    /// Lowercase hex digest of `preimage`.
    fn hash_hex(&self, preimage: &[u8]) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha256Hasher;

impl BlockHasher for Sha256Hasher {
    fn hash_hex(&self, preimage: &[u8]) -> String {
        hex::encode(Sha256::digest(preimage))
    }
}

/// Number of leading `'0'` characters of a hex digest.
pub fn leading_zeros(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}

/// Whether `hash` starts with at least `difficulty` hex zeros.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_zeros(hash) >= difficulty as usize
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic stand-in: a preimage hashes to all zeros exactly when
    /// its nonce field equals `winning_nonce`, otherwise to a digest that
    /// starts with `f`.
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct NonceGateHasher {
        pub winning_nonce: u64,
    }

    impl BlockHasher for NonceGateHasher {
        fn hash_hex(&self, preimage: &[u8]) -> String {
            let text = String::from_utf8_lossy(preimage);
            let nonce = text.split(':').nth(2).and_then(|n| n.parse::<u64>().ok());
            if nonce == Some(self.winning_nonce) {
                "0".repeat(64)
            } else {
                let digest = Sha256Hasher.hash_hex(preimage);
                format!("f{}", &digest[1..])
            }
        }
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            Sha256Hasher.hash_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn leading_zero_predicate() {
        assert!(meets_difficulty("00ab", 0));
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("00ab", 3));
        assert!(!meets_difficulty("0", 2));
        assert_eq!(leading_zeros("000"), 3);
    }
}
