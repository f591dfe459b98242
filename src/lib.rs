pub mod blockchain;
pub mod config;
pub mod consensus;
pub mod error;
pub mod pow;
pub mod transaction;
pub mod vdf;

pub use blockchain::{Chain, HybridBlock};
pub use config::NodeConfig;
pub use consensus::{HybridConsensus, Phase, VdfInput};
