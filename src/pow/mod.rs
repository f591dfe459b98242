//! Proof-of-work proposal: nonce search, seal validation and the
//! height-indexed difficulty schedule with its windowed retarget.

pub mod difficulty;
pub mod miner;
pub mod validator;

pub use difficulty::{DifficultyAdjuster, DifficultySchedule, SharedSchedule};
pub use miner::{MinedBlock, PowEngine};
pub use validator::PowValidator;
