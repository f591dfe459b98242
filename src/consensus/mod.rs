//! Hybrid consensus: a block is proposed by proof-of-work, finalized by a
//! VDF proof over its pow hash, and accepted only when both check out.

pub mod hybrid;
pub mod posw;
pub mod race;
pub mod validator;

pub use hybrid::{HybridConsensus, Phase, PhaseTimings};
pub use posw::{PoswFinalizer, PoswValidator, VdfInput};
pub use race::{BlockRace, RaceOutcome, race};
pub use validator::BlockValidator;
