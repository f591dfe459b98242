pub mod block;
pub mod hasher;
pub mod model;

pub use block::HybridBlock;
pub use hasher::{BlockHasher, Sha256Hasher, leading_zeros, meets_difficulty};
pub use model::Chain;

/// Default Proof-of-Work difficulty (number of leading hex zeros).
pub const DEFAULT_DIFFICULTY: u32 = 3;

/// Maximum number of client requests in one block.
pub const MAX_TXS_PER_BLOCK: usize = 10;

/// Target seconds per block for retargeting.
pub const TARGET_BLOCK_TIME_SECS: i64 = 600;

/// Blocks per retarget window.
pub const DIFF_ADJUST_WINDOW: usize = 2016;

/// Difficulty bounds. A SHA-256 hex digest has 64 characters.
pub const DIFF_MIN: u32 = 1;
pub const DIFF_MAX: u32 = 64;
