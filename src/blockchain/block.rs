use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{BlockHasher, Sha256Hasher};
use crate::error::{ConsensusError, Rejection};
use crate::transaction::{ClientReq, KeyRegistry};
use crate::vdf::SequentialProof;

/// A block carrying both a proof-of-work seal and, once finalized, a
/// sequential-work (VDF) proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridBlock {
    pub height: u64,
    /// `None` only for genesis.
    pub prev_hash: Option<String>,
    pub transactions: Vec<ClientReq>,
    /// Hash over every committed field; see [`HybridBlock::compute_hash`].
    pub block_hash: String,
    pub timestamp: i64, // Unix timestamp in milliseconds (UTC)

    pub nonce: u64,      // Proof-of-Work nonce
    pub difficulty: u32, // required leading hex zeros
    pub pow_hash: Option<String>,

    pub vdf_proof: Option<SequentialProof>,
    pub time_parameter: u64,
    pub finalized: bool,
}

impl HybridBlock {
    /// Create the genesis block (first block in the chain). It is trusted
    /// as-is: sealed at difficulty 0 and never finalized.
    pub fn genesis() -> Self {
        let mut block = Self::new_with_timestamp(0, None, Vec::new(), 0, 0);
        let hash = block.compute_pow_hash();
        block.seal_pow(hash);
        block
    }

    /// Create a new block (not mined yet) stamped with the current time.
    pub fn new(
        height: u64,
        prev_hash: Option<String>,
        transactions: Vec<ClientReq>,
        difficulty: u32,
    ) -> Self {
        Self::new_with_timestamp(
            height,
            prev_hash,
            transactions,
            difficulty,
            Utc::now().timestamp_millis(),
        )
    }

    pub fn new_with_timestamp(
        height: u64,
        prev_hash: Option<String>,
        transactions: Vec<ClientReq>,
        difficulty: u32,
        timestamp: i64,
    ) -> Self {
        let mut block = Self {
            height,
            prev_hash,
            transactions,
            block_hash: String::new(),
            timestamp,
            nonce: 0,
            difficulty,
            pow_hash: None,
            vdf_proof: None,
            time_parameter: 0,
            finalized: false,
        };
        block.block_hash = block.compute_hash();
        block
    }

    /// SHA-256 over the canonical encoding of every transaction, in order.
    pub fn transactions_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for tx in &self.transactions {
            hasher.update(tx.canonical().as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    /// Preimage of the proof-of-work hash: `prev:txs:nonce:difficulty`.
    pub fn pow_preimage(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.prev_hash.as_deref().unwrap_or(""),
            self.transactions_hash(),
            self.nonce,
            self.difficulty
        )
    }

    pub fn compute_pow_hash(&self) -> String {
        self.compute_pow_hash_with(&Sha256Hasher)
    }

    pub fn compute_pow_hash_with<H: BlockHasher + ?Sized>(&self, hasher: &H) -> String {
        hasher.hash_hex(self.pow_preimage().as_bytes())
    }

    /// Canonical block hash. Equals the proof-of-work hash until a VDF proof
    /// is attached, after which it also commits to `time_parameter` and the
    /// proof.
    pub fn compute_hash(&self) -> String {
        self.compute_hash_with(&Sha256Hasher)
    }

    pub fn compute_hash_with<H: BlockHasher + ?Sized>(&self, hasher: &H) -> String {
        match &self.vdf_proof {
            None => self.compute_pow_hash_with(hasher),
            Some(proof) => {
                let preimage = format!(
                    "{}:{}:{}",
                    self.pow_preimage(),
                    self.time_parameter,
                    proof.fingerprint()
                );
                hasher.hash_hex(preimage.as_bytes())
            }
        }
    }

    /// Record a winning proof-of-work hash as both `pow_hash` and `block_hash`.
    pub fn seal_pow(&mut self, hash: String) {
        self.block_hash = hash.clone();
        self.pow_hash = Some(hash);
    }

    /// Attach a VDF proof, mark the block finalized and rehash it.
    pub fn attach_proof(&mut self, proof: SequentialProof) {
        self.attach_proof_with(proof, &Sha256Hasher)
    }

    pub fn attach_proof_with<H: BlockHasher + ?Sized>(
        &mut self,
        proof: SequentialProof,
        hasher: &H,
    ) {
        self.time_parameter = proof.time_parameter();
        self.vdf_proof = Some(proof);
        self.finalized = true;
        self.block_hash = self.compute_hash_with(hasher);
    }

    /// Finalized and actually carrying a proof.
    pub fn is_finalized(&self) -> bool {
        self.finalized && self.vdf_proof.is_some()
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.prev_hash.is_none()
    }

    pub fn append_transaction(&mut self, tx: ClientReq, max: usize) -> Result<(), ConsensusError> {
        if self.is_full(max) {
            return Err(ConsensusError::BlockFull { max });
        }
        self.transactions.push(tx);
        self.block_hash = self.compute_hash();
        Ok(())
    }

    pub fn is_full(&self, max: usize) -> bool {
        self.transactions.len() >= max
    }

    /// Check every transaction against externally supplied public keys.
    pub fn validate_transactions(&self, keys: &KeyRegistry) -> Result<(), Rejection> {
        for tx in &self.transactions {
            keys.verify(tx).map_err(|reason| Rejection::Transaction {
                txid: tx.txid.clone(),
                sender: tx.sender_id,
                reason,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::HybridBlock;
    use crate::error::{ConsensusError, Rejection};
    use crate::transaction::signature::tests::{keypair, signed_req};
    use crate::transaction::{ClientReq, KeyRegistry};
    use crate::vdf::SequentialProof;

    fn tx(seq: u64) -> ClientReq {
        ClientReq::new(1, seq, "transfer 5 to 2", "3045".into())
    }

    fn proof(output: u32) -> SequentialProof {
        SequentialProof::from_parts(BigUint::from(output), vec![BigUint::from(4u32)], 2, 1)
    }

    #[test]
    fn genesis_has_valid_hash() {
        let b = HybridBlock::genesis();
        assert_eq!(b.block_hash, b.compute_hash());
        assert_eq!(b.pow_hash.as_deref(), Some(b.block_hash.as_str()));
        assert!(b.is_genesis());
        assert!(!b.is_finalized());
    }

    #[test]
    fn hash_is_idempotent() {
        let b = HybridBlock::new_with_timestamp(1, Some("prev".into()), vec![tx(0)], 2, 10);
        assert_eq!(b.compute_hash(), b.compute_hash());
        assert_eq!(b.block_hash, b.compute_hash());
    }

    #[test]
    fn every_committed_field_changes_the_hash() {
        let base = HybridBlock::new_with_timestamp(1, Some("prev".into()), vec![tx(0)], 2, 10);
        let h = base.compute_hash();

        let mut b = base.clone();
        b.nonce += 1;
        assert_ne!(h, b.compute_hash());

        let mut b = base.clone();
        b.difficulty += 1;
        assert_ne!(h, b.compute_hash());

        let mut b = base.clone();
        b.transactions.push(tx(1));
        assert_ne!(h, b.compute_hash());

        let mut b = base.clone();
        b.prev_hash = Some("other".into());
        assert_ne!(h, b.compute_hash());

        let mut finalized = base.clone();
        finalized.attach_proof(proof(9));
        assert_ne!(h, finalized.compute_hash());

        let mut other_proof = base;
        other_proof.attach_proof(proof(10));
        assert_ne!(finalized.compute_hash(), other_proof.compute_hash());
    }

    #[test]
    fn attaching_proof_finalizes_and_rehashes() {
        let mut b = HybridBlock::new_with_timestamp(1, Some("prev".into()), vec![], 0, 10);
        let pow = b.compute_pow_hash();
        b.seal_pow(pow.clone());

        b.attach_proof(proof(9));
        assert!(b.is_finalized());
        assert_eq!(b.time_parameter, 2);
        assert_eq!(b.pow_hash, Some(pow.clone()));
        assert_ne!(b.block_hash, pow);
        assert_eq!(b.block_hash, b.compute_hash());
        // the proof-of-work preimage does not cover the proof
        assert_eq!(b.compute_pow_hash(), pow);
    }

    #[test]
    fn append_respects_cap() {
        let mut b = HybridBlock::new(1, Some("prev".into()), vec![], 1);
        b.append_transaction(tx(0), 2).unwrap();
        b.append_transaction(tx(1), 2).unwrap();
        assert!(b.is_full(2));
        assert_eq!(
            b.append_transaction(tx(2), 2),
            Err(ConsensusError::BlockFull { max: 2 })
        );
        assert_eq!(b.block_hash, b.compute_hash());
    }

    #[test]
    fn transactions_checked_against_registry() {
        let (sk, pk) = keypair();
        let mut keys = KeyRegistry::new();
        keys.insert(3, pk);

        let good = HybridBlock::new(1, Some("prev".into()), vec![signed_req(&sk, 3, 0, "op")], 1);
        assert!(good.validate_transactions(&keys).is_ok());

        let bad = HybridBlock::new(1, Some("prev".into()), vec![signed_req(&sk, 4, 0, "op")], 1);
        assert!(matches!(
            bad.validate_transactions(&keys),
            Err(Rejection::Transaction {
                sender: 4,
                reason: "unknown sender",
                ..
            })
        ));
    }
}
