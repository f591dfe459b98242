use chrono::Utc;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A VDF output together with its Pietrzak proof. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequentialProof {
    /// y = x^(2^T) mod N
    #[serde(with = "hex_biguint")]
    output: BigUint,
    /// Midpoints mu_i from the halving rounds, outermost first.
    #[serde(with = "hex_biguint_vec")]
    proof_elements: Vec<BigUint>,
    time_parameter: u64,
    /// Unix timestamp in milliseconds (UTC).
    created_at: i64,
}

impl SequentialProof {
    pub fn new(output: BigUint, proof_elements: Vec<BigUint>, time_parameter: u64) -> Self {
        Self::from_parts(output, proof_elements, time_parameter, Utc::now().timestamp_millis())
    }

    /// Rebuild a proof received from elsewhere.
    pub fn from_parts(
        output: BigUint,
        proof_elements: Vec<BigUint>,
        time_parameter: u64,
        created_at: i64,
    ) -> Self {
        Self {
            output,
            proof_elements,
            time_parameter,
            created_at,
        }
    }

    pub fn output(&self) -> &BigUint {
        &self.output
    }

    pub fn proof_elements(&self) -> &[BigUint] {
        &self.proof_elements
    }

    pub fn time_parameter(&self) -> u64 {
        self.time_parameter
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Encoded size: output and elements plus two 8-byte integers.
    pub fn size_bytes(&self) -> usize {
        let elements: usize = self
            .proof_elements
            .iter()
            .map(|e| e.to_bytes_be().len())
            .sum();
        self.output.to_bytes_be().len() + elements + 16
    }

    /// Hex SHA-256 over every field; this is what the block hash commits to.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.output.to_str_radix(16));
        for element in &self.proof_elements {
            hasher.update(b":");
            hasher.update(element.to_str_radix(16));
        }
        hasher.update(format!("|{}|{}", self.time_parameter, self.created_at));
        hex::encode(hasher.finalize())
    }
}

mod hex_biguint {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_str_radix(16))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        let text = String::deserialize(d)?;
        BigUint::parse_bytes(text.as_bytes(), 16)
            .ok_or_else(|| de::Error::custom("invalid hex big integer"))
    }
}

mod hex_biguint_vec {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer, de, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(values: &[BigUint], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&v.to_str_radix(16))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<BigUint>, D::Error> {
        let texts = Vec::<String>::deserialize(d)?;
        texts
            .iter()
            .map(|t| {
                BigUint::parse_bytes(t.as_bytes(), 16)
                    .ok_or_else(|| de::Error::custom("invalid hex big integer"))
            })
            .collect()
    }
}
