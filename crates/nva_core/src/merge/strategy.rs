//! Strategy selection.
//!
//! Maps a compatibility report (plus input volume) to an ordered fallback
//! chain. The first matching rule wins:
//!
//! 1. too many or too large inputs: `[Batched]`
//! 2. frame-rate mismatch or timing anomaly: `[NormalizeConcat]`
//! 3. codec or resolution mismatch: `[Reencode, NormalizeConcat]`
//! 4. otherwise: `[StreamCopy, Reencode, NormalizeConcat]`
//!
//! Rule 2 is absolute: stream copy and plain re-encode are never attempted
//! for clips whose timing is inconsistent.

use serde::{Deserialize, Serialize};

use crate::compat::CompatibilityReport;
use crate::config::MergeSettings;
use crate::models::MergeStrategy;

/// Non-empty ordered list of strategies, consumed left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackChain(Vec<MergeStrategy>);

impl FallbackChain {
    /// Returns `None` for an empty list.
    pub fn new(strategies: Vec<MergeStrategy>) -> Option<Self> {
        if strategies.is_empty() {
            None
        } else {
            Some(Self(strategies))
        }
    }

    pub fn single(strategy: MergeStrategy) -> Self {
        Self(vec![strategy])
    }

    pub fn first(&self) -> MergeStrategy {
        self.0[0]
    }

    pub fn strategies(&self) -> &[MergeStrategy] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_batched(&self) -> bool {
        self.0 == [MergeStrategy::Batched]
    }
}

impl std::fmt::Display for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "[{}]", names.join(" -> "))
    }
}

/// Thresholds that send a merge through the batch merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorLimits {
    pub batch_threshold: usize,
    pub volume_threshold_bytes: u64,
}

impl From<&MergeSettings> for SelectorLimits {
    fn from(settings: &MergeSettings) -> Self {
        Self {
            batch_threshold: settings.batch_threshold,
            volume_threshold_bytes: settings.volume_threshold_mb.saturating_mul(1024 * 1024),
        }
    }
}

impl Default for SelectorLimits {
    fn default() -> Self {
        Self::from(&MergeSettings::default())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StrategySelector {
    limits: SelectorLimits,
}

impl StrategySelector {
    pub fn new(limits: SelectorLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> SelectorLimits {
        self.limits
    }

    /// Full selection including the batching rule.
    pub fn select(
        &self,
        report: &CompatibilityReport,
        input_count: usize,
        total_bytes: u64,
    ) -> FallbackChain {
        if input_count > self.limits.batch_threshold
            || total_bytes > self.limits.volume_threshold_bytes
        {
            return FallbackChain::single(MergeStrategy::Batched);
        }
        self.select_leaf(report)
    }

    /// Selection without the batching rule; always yields leaf strategies.
    ///
    /// Used for the groups inside a batched merge, which must not batch again.
    pub fn select_leaf(&self, report: &CompatibilityReport) -> FallbackChain {
        let strategies = if report.requires_normalization() {
            vec![MergeStrategy::NormalizeConcat]
        } else if report.requires_reencode() {
            vec![MergeStrategy::Reencode, MergeStrategy::NormalizeConcat]
        } else {
            vec![
                MergeStrategy::StreamCopy,
                MergeStrategy::Reencode,
                MergeStrategy::NormalizeConcat,
            ]
        };
        FallbackChain(strategies)
    }
}
