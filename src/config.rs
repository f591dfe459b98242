use std::env;
use std::str::FromStr;

use num_bigint::BigUint;

use crate::blockchain::{
    DEFAULT_DIFFICULTY, DIFF_ADJUST_WINDOW, DIFF_MAX, MAX_TXS_PER_BLOCK, TARGET_BLOCK_TIME_SECS,
};
use crate::consensus::VdfInput;
use crate::error::ConfigError;
use crate::pow::DifficultyAdjuster;
use crate::vdf::params::rsa_2048_modulus;
use crate::vdf::{DEFAULT_SECURITY_PARAMETER, DEFAULT_TIME_PARAMETER, VdfParameters};

/// Node settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub vdf: VdfParameters,
    pub vdf_input: VdfInput,
    pub initial_difficulty: u32,
    pub max_difficulty: u32,
    pub target_block_time_secs: i64,
    pub difficulty_window: usize,
    pub max_txs_per_block: usize,
    pub blocks_to_mine: u64,
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let modulus = match lookup("VDF_MODULUS") {
            Some(raw) => {
                BigUint::parse_bytes(raw.trim().as_bytes(), 10).ok_or(ConfigError::Invalid {
                    key: "VDF_MODULUS",
                    value: raw,
                })?
            }
            None => rsa_2048_modulus(),
        };
        let vdf = VdfParameters::new(
            modulus,
            parse_or(&lookup, "VDF_TIME_PARAMETER", DEFAULT_TIME_PARAMETER)?,
            parse_or(&lookup, "VDF_SECURITY_PARAMETER", DEFAULT_SECURITY_PARAMETER)?,
        )?;

        let vdf_input = if parse_or(&lookup, "VDF_BIND_TIMESTAMP", false)? {
            VdfInput::PowHashWithTimestamp
        } else {
            VdfInput::PowHash
        };

        Ok(Self {
            vdf,
            vdf_input,
            initial_difficulty: parse_or(&lookup, "INITIAL_DIFFICULTY", DEFAULT_DIFFICULTY)?,
            max_difficulty: parse_or(&lookup, "MAX_DIFFICULTY", DIFF_MAX)?,
            target_block_time_secs: parse_positive(
                &lookup,
                "TARGET_BLOCK_TIME_SECS",
                TARGET_BLOCK_TIME_SECS,
            )?,
            difficulty_window: parse_positive(&lookup, "DIFFICULTY_WINDOW", DIFF_ADJUST_WINDOW)?,
            max_txs_per_block: parse_or(&lookup, "MAX_TXS_PER_BLOCK", MAX_TXS_PER_BLOCK)?,
            blocks_to_mine: parse_or(&lookup, "BLOCKS_TO_MINE", 3)?,
        })
    }

    pub fn adjuster(&self) -> DifficultyAdjuster {
        DifficultyAdjuster::new(
            self.difficulty_window,
            self.target_block_time_secs,
            self.max_difficulty,
        )
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

/// Like `parse_or`, but zero and negative values are invalid.
fn parse_positive<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
{
    let value = parse_or(lookup, key, default)?;
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: lookup(key).unwrap_or_default(),
        })
    }
}
