use thiserror::Error;

/// Invalid cryptographic parameters. The node must not start with these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("modulus must be greater than 1")]
    ModulusTooSmall,
    #[error("modulus must be odd")]
    EvenModulus,
    #[error("time parameter must be at least 1")]
    ZeroTimeParameter,
    #[error("security parameter must be within 1..=256 bits, got {0}")]
    SecurityParameter(u32),
}

/// Proof generation hit a state that a correct engine never reaches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VdfError {
    #[error("proof element at round {round} is not in the signed quadratic residue group")]
    NonResidueProofElement { round: usize },
}

/// Why a block's proof-of-work was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowRejection {
    #[error("block carries no proof-of-work hash")]
    MissingPowHash,
    #[error("stored pow hash {stored} does not match recomputed {computed}")]
    HashMismatch { stored: String, computed: String },
    #[error("recorded difficulty {recorded} is below the required {required}")]
    DifficultyBelowSchedule { recorded: u32, required: u32 },
    #[error("hash does not have {difficulty} leading zeros")]
    TargetNotMet { difficulty: u32 },
}

/// Why a sequential-work proof was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofRejection {
    #[error("block is not finalized with a VDF proof")]
    MissingProof,
    #[error("block has no proof-of-work hash to derive the VDF input from")]
    MissingInput,
    #[error("proof time parameter {found} differs from the configured {expected}")]
    TimeParameterMismatch { expected: u64, found: u64 },
    #[error("block time parameter {block} differs from its proof's {proof}")]
    BlockTimeParameter { block: u64, proof: u64 },
    #[error("claimed output is not a canonical signed group element")]
    OutputOutOfRange,
    #[error("proof element {index} is not a canonical signed group element")]
    ElementOutOfRange { index: usize },
    #[error("proof element {index} is not in the signed quadratic residue group")]
    NotResidue { index: usize },
    #[error("proof ended after {len} elements before reaching T = 1")]
    ProofTooShort { len: usize },
    #[error("proof has {extra} unused trailing elements")]
    ProofTooLong { extra: usize },
    #[error("claimed output does not match the final squaring")]
    OutputMismatch,
}

/// Aggregate verdict of block validation, naming the failing stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("proof-of-work rejected: {0}")]
    Pow(#[from] PowRejection),
    #[error("sequential-work proof rejected: {0}")]
    Posw(#[from] ProofRejection),
    #[error("block hash {stored} does not match its contents ({computed})")]
    BlockHashMismatch { stored: String, computed: String },
    #[error("block height {found} does not extend height {tip}")]
    WrongHeight { tip: u64, found: u64 },
    #[error("block does not link to the previous block")]
    WrongParent,
    #[error("transaction {txid} from sender {sender} failed signature validation: {reason}")]
    Transaction {
        txid: String,
        sender: u32,
        reason: &'static str,
    },
}

/// Pipeline misuse and generation failures raised by the consensus layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("{count} transactions exceed the per-block cap of {max}")]
    TooManyTransactions { count: usize, max: usize },
    #[error("block is full ({max} transactions)")]
    BlockFull { max: usize },
    #[error("cannot finalize a block without a proof-of-work hash")]
    MissingPowHash,
    #[error("operation requires phase {expected:?}, orchestrator is in {actual:?}")]
    InvalidPhase {
        expected: crate::consensus::Phase,
        actual: crate::consensus::Phase,
    },
    #[error("block {pow_hash} was not mined by the preceding proposal")]
    NotProposed { pow_hash: String },
    #[error("nonce search was cancelled")]
    Cancelled,
    #[error(transparent)]
    Vdf(#[from] VdfError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("mining task failed: {0}")]
    MiningTask(String),
    #[error("block rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("block #{height} failed audit: {reason}")]
    AuditFailed { height: u64, reason: Rejection },
}

/// Appends to the difficulty schedule must move strictly forward.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("schedule entry at height {height} does not follow the last entry at {last}")]
    NotAppendOnly { last: u64, height: u64 },
}

/// Chain history rejects blocks that do not extend the tip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("block at height {found} does not follow tip height {tip}")]
    HeightMismatch { tip: u64, found: u64 },
    #[error("block does not reference the tip hash")]
    BrokenLink,
    #[error("only finalized blocks can join the chain")]
    NotFinalized,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
    #[error(transparent)]
    Params(#[from] ParamError),
}
