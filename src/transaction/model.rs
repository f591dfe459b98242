use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A client request ordered into a block. The core treats the operation as
/// opaque; only the txid and canonical encoding feed the block hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReq {
    /// A stable identifier computed from content (signature included).
    pub txid: String,
    pub sender_id: u32,
    /// Per-sender sequence number, prevents replaying an identical request.
    pub seq: u64,
    pub operation: String,
    /// Hex-encoded DER ECDSA signature over `sighash()`.
    pub signature: String,
}

impl ClientReq {
    /// Build a request and compute its txid deterministically from its content.
    pub fn new(sender_id: u32, seq: u64, operation: impl Into<String>, signature: String) -> Self {
        let operation = operation.into();
        let payload = serde_json::json!({
            "sender_id": sender_id,
            "seq": seq,
            "operation": operation,
            "signature": signature,
        });
        let mut hasher = Sha256::new();
        hasher.update(payload.to_string().as_bytes());
        let txid = hex::encode(hasher.finalize());

        Self {
            txid,
            sender_id,
            seq,
            operation,
            signature,
        }
    }

    /// Canonical signing payload (JSON) that excludes the signature.
    pub fn signing_payload(&self) -> Vec<u8> {
        let payload = serde_json::json!({
            "sender_id": self.sender_id,
            "seq": self.seq,
            "operation": self.operation,
        });
        payload.to_string().into_bytes()
    }

    /// SHA-256 of the signing payload.
    pub fn sighash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_payload());
        hasher.finalize().into()
    }

    /// Encoding folded into the block's transactions hash.
    pub fn canonical(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.txid, self.sender_id, self.seq, self.operation, self.signature
        )
    }

    /// Structural checks that need no key material.
    pub fn is_well_formed(&self) -> bool {
        !self.operation.is_empty() && !self.signature.is_empty()
    }
}
