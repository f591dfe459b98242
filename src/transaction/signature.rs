use std::collections::HashMap;

use secp256k1::{Message, PublicKey, Secp256k1, ecdsa::Signature};

use super::ClientReq;

/// Verify a signature (hex DER) against the given pubkey (hex, compressed)
/// and message hash (32 bytes).
pub fn verify_signature_hex(
    pubkey_hex: &str,
    sig_hex: &str,
    msg32: [u8; 32],
) -> Result<bool, &'static str> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|_| "invalid signature hex")?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| "invalid DER signature")?;

    let pk_bytes = hex::decode(pubkey_hex).map_err(|_| "invalid pubkey hex")?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| "invalid pubkey bytes")?;

    let msg = Message::from_slice(&msg32).map_err(|_| "invalid message length")?;
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}

/// Public keys of known senders, supplied by whoever manages membership.
#[derive(Debug, Default, Clone)]
pub struct KeyRegistry {
    keys: HashMap<u32, String>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the hex-encoded compressed public key of a sender.
    pub fn insert(&mut self, sender_id: u32, pubkey_hex: impl Into<String>) {
        self.keys.insert(sender_id, pubkey_hex.into());
    }

    pub fn get(&self, sender_id: u32) -> Option<&str> {
        self.keys.get(&sender_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check one request: well-formed, known sender, valid signature.
    pub fn verify(&self, tx: &ClientReq) -> Result<(), &'static str> {
        if !tx.is_well_formed() {
            return Err("malformed request");
        }
        let pubkey = self.get(tx.sender_id).ok_or("unknown sender")?;
        if verify_signature_hex(pubkey, &tx.signature, tx.sighash())? {
            Ok(())
        } else {
            Err("incorrect signature")
        }
    }
}
