use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::blockchain::{
    DIFF_ADJUST_WINDOW, DIFF_MAX, DIFF_MIN, HybridBlock, TARGET_BLOCK_TIME_SECS,
};
use crate::error::ScheduleError;

/// Bounds on `target_timespan / actual_timespan` per retarget.
pub const MAX_ADJUSTMENT_FACTOR: f64 = 4.0;
pub const MIN_ADJUSTMENT_FACTOR: f64 = 0.25;

/// Height-indexed difficulty. A lookup returns the entry with the largest
/// height not above the queried one, so difficulty only changes at
/// retarget points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultySchedule {
    entries: BTreeMap<u64, u32>,
}

impl DifficultySchedule {
    pub fn new(initial: u32) -> Self {
        Self {
            entries: BTreeMap::from([(0, initial)]),
        }
    }

    pub fn difficulty_at(&self, height: u64) -> u32 {
        self.entries
            .range(..=height)
            .next_back()
            .map(|(_, difficulty)| *difficulty)
            .unwrap_or_default()
    }

    /// Append an entry. Heights must strictly increase.
    pub fn record(&mut self, height: u64, difficulty: u32) -> Result<(), ScheduleError> {
        let (last, _) = self.latest();
        if height <= last {
            return Err(ScheduleError::NotAppendOnly { last, height });
        }
        self.entries.insert(height, difficulty);
        Ok(())
    }

    /// The newest entry as `(height, difficulty)`.
    pub fn latest(&self) -> (u64, u32) {
        self.entries
            .last_key_value()
            .map(|(h, d)| (*h, *d))
            .unwrap_or_default()
    }

    pub fn entries(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.entries.iter().map(|(h, d)| (*h, *d))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A schedule shared between the miner, validators and the adjuster.
/// Appends take the write lock, so a reader never sees a half-written entry.
#[derive(Debug, Clone)]
pub struct SharedSchedule(Arc<RwLock<DifficultySchedule>>);

impl SharedSchedule {
    pub fn new(schedule: DifficultySchedule) -> Self {
        Self(Arc::new(RwLock::new(schedule)))
    }

    pub fn difficulty_at(&self, height: u64) -> u32 {
        self.0.read().difficulty_at(height)
    }

    pub fn record(&self, height: u64, difficulty: u32) -> Result<(), ScheduleError> {
        self.0.write().record(height, difficulty)
    }

    pub fn latest(&self) -> (u64, u32) {
        self.0.read().latest()
    }

    pub fn snapshot(&self) -> DifficultySchedule {
        self.0.read().clone()
    }
}

/// Windowed retarget by one leading-zero unit at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyAdjuster {
    window: usize,
    target_block_time_ms: i64,
    max_difficulty: u32,
}

impl Default for DifficultyAdjuster {
    fn default() -> Self {
        Self::new(DIFF_ADJUST_WINDOW, TARGET_BLOCK_TIME_SECS, DIFF_MAX)
    }
}

impl DifficultyAdjuster {
    /// `window` is clamped to at least 2 blocks, one timespan needs two stamps.
    /// The target block time is clamped to at least one second.
    pub fn new(window: usize, target_block_time_secs: i64, max_difficulty: u32) -> Self {
        Self {
            window: window.max(2),
            target_block_time_ms: target_block_time_secs.max(1).saturating_mul(1000),
            max_difficulty: max_difficulty.max(DIFF_MIN),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn max_difficulty(&self) -> u32 {
        self.max_difficulty
    }

    /// `target_timespan / actual_timespan` over the newest `window` blocks,
    /// clamped to `[0.25, 4.0]`. `None` until a full window exists.
    pub fn adjustment_factor(&self, recent_blocks: &[HybridBlock]) -> Option<f64> {
        if recent_blocks.len() < self.window {
            return None;
        }
        let window = &recent_blocks[recent_blocks.len() - self.window..];
        let actual = window[window.len() - 1].timestamp - window[0].timestamp;
        let window_len = i64::try_from(self.window).unwrap_or(i64::MAX);
        let target = self.target_block_time_ms.saturating_mul(window_len);

        let factor = if actual <= 0 {
            MAX_ADJUSTMENT_FACTOR
        } else {
            target as f64 / actual as f64
        };
        Some(factor.clamp(MIN_ADJUSTMENT_FACTOR, MAX_ADJUSTMENT_FACTOR))
    }

    /// New difficulty: one more leading zero when blocks came faster than
    /// target (factor > 1), one fewer when slower, never below 1 nor above
    /// the cap. Returns `current` until a full window exists.
    pub fn retarget(&self, recent_blocks: &[HybridBlock], current: u32) -> u32 {
        let Some(factor) = self.adjustment_factor(recent_blocks) else {
            return current;
        };

        let next = if factor > 1.0 {
            if current >= self.max_difficulty {
                current
            } else {
                current + 1
            }
        } else if factor < 1.0 {
            current.saturating_sub(1)
        } else {
            current
        };
        let next = next.max(DIFF_MIN);

        info!(
            "Difficulty adjusted from {} to {} leading zeros (factor: {:.4})",
            current, next, factor
        );
        next
    }
}
