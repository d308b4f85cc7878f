//! Wall-clock budgets per strategy.

use std::time::Duration;

use crate::config::MergeSettings;
use crate::models::MergeStrategy;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// `minutes = clamp(ceil(total_mb / mb_per_minute), min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBudget {
    pub mb_per_minute: f64,
    pub min_minutes: u64,
    pub max_minutes: u64,
}

impl TimeBudget {
    pub fn new(mb_per_minute: f64, min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            mb_per_minute,
            min_minutes,
            max_minutes,
        }
    }

    pub fn minutes_for(&self, total_bytes: u64) -> u64 {
        let megabytes = total_bytes as f64 / BYTES_PER_MB;
        let raw = if self.mb_per_minute > 0.0 {
            (megabytes / self.mb_per_minute).ceil() as u64
        } else {
            self.max_minutes
        };
        raw.clamp(self.min_minutes, self.max_minutes.max(self.min_minutes))
    }

    pub fn for_bytes(&self, total_bytes: u64) -> Duration {
        Duration::from_secs(self.minutes_for(total_bytes) * 60)
    }
}

/// Budgets for every merge strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetTable {
    pub stream_copy: TimeBudget,
    pub reencode: TimeBudget,
    pub normalize: TimeBudget,
}

impl BudgetTable {
    /// Budget for one leaf attempt. `Batched` never runs as a single
    /// invocation; it gets the normalize budget when asked.
    pub fn for_strategy(&self, strategy: MergeStrategy) -> TimeBudget {
        match strategy {
            MergeStrategy::StreamCopy => self.stream_copy,
            MergeStrategy::Reencode => self.reencode,
            MergeStrategy::NormalizeConcat | MergeStrategy::Batched => self.normalize,
        }
    }
}

impl From<&MergeSettings> for BudgetTable {
    fn from(s: &MergeSettings) -> Self {
        Self {
            stream_copy: TimeBudget::new(
                s.copy_mb_per_minute,
                s.copy_min_minutes,
                s.copy_max_minutes,
            ),
            reencode: TimeBudget::new(
                s.reencode_mb_per_minute,
                s.reencode_min_minutes,
                s.reencode_max_minutes,
            ),
            normalize: TimeBudget::new(
                s.normalize_mb_per_minute,
                s.normalize_min_minutes,
                s.normalize_max_minutes,
            ),
        }
    }
}

impl Default for BudgetTable {
    fn default() -> Self {
        Self::from(&MergeSettings::default())
    }
}
