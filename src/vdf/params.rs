use std::fmt;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;

use crate::error::ParamError;

/// RSA-2048 challenge number. Nobody is known to hold its factorization,
/// which is what makes the group order unknown to every prover.
pub const RSA_2048_DECIMAL: &str = concat!(
    "25195908475657893494027183240048398571429282126204032027777137836043662020707595556264018",
    "52588078440691829064124951508218929855914917618450280848912007284499268739280728777673597",
    "14183472702618963750149718246911650776133798590957000973304597488084284017974291006424586",
    "91817195118746121515172654632282216869987549182422433637259085141865462043576798423387184",
    "77444792073993423658482382428119816381501067481045166037730605620161967625613384414360383",
    "39044149526344321901146575444541784240209246165157233507787077498171257724679629263863563",
    "73289912154831438167899885040445364023527381951378636564391212010397122822120720357",
);

/// Default number of sequential squarings.
pub const DEFAULT_TIME_PARAMETER: u64 = 1_000_000;

/// Default bit length of the Fiat-Shamir challenge.
pub const DEFAULT_SECURITY_PARAMETER: u32 = 128;

/// Process-wide VDF configuration: modulus N, time parameter T and
/// security parameter λ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdfParameters {
    modulus: BigUint,
    time_parameter: u64,
    security_parameter: u32,
    /// Bytes needed to encode any residue mod N; fixes the transcript layout.
    element_width: usize,
}

impl VdfParameters {
    pub fn new(
        modulus: BigUint,
        time_parameter: u64,
        security_parameter: u32,
    ) -> Result<Self, ParamError> {
        if modulus <= BigUint::one() {
            return Err(ParamError::ModulusTooSmall);
        }
        if modulus.is_even() {
            return Err(ParamError::EvenModulus);
        }
        if time_parameter == 0 {
            return Err(ParamError::ZeroTimeParameter);
        }
        if security_parameter == 0 || security_parameter > 256 {
            return Err(ParamError::SecurityParameter(security_parameter));
        }
        let element_width = modulus.bits().div_ceil(8) as usize;
        Ok(Self {
            modulus,
            time_parameter,
            security_parameter,
            element_width,
        })
    }

    /// Parameters over the RSA-2048 modulus.
    pub fn rsa_2048(time_parameter: u64, security_parameter: u32) -> Result<Self, ParamError> {
        Self::new(rsa_2048_modulus(), time_parameter, security_parameter)
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn time_parameter(&self) -> u64 {
        self.time_parameter
    }

    pub fn security_parameter(&self) -> u32 {
        self.security_parameter
    }

    pub fn element_width(&self) -> usize {
        self.element_width
    }
}

impl fmt::Display for VdfParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VdfParameters{{modulus={} bits, T={}, lambda={}}}",
            self.modulus.bits(),
            self.time_parameter,
            self.security_parameter
        )
    }
}

pub fn rsa_2048_modulus() -> BigUint {
    BigUint::parse_bytes(RSA_2048_DECIMAL.as_bytes(), 10).expect("RSA-2048 literal is decimal")
}
