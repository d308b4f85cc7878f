//! Duration reconciliation between narration and video.

use serde::{Deserialize, Serialize};

use super::{BindError, BindResult};

/// What happens to the narration so the output lasts exactly as long as
/// the video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Delayed narration ends with the video.
    Exact,
    /// Delayed narration runs past the video by `excess_secs`; the tail is cut.
    Trim { excess_secs: f64 },
    /// Video runs `gap_secs` past the delayed narration; filled with silence.
    SilentTail { gap_secs: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BindPlan {
    pub video_secs: f64,
    pub narration_secs: f64,
    pub offset_secs: f64,
    /// Narration duration plus offset.
    pub span_secs: f64,
    /// Always the video duration.
    pub output_secs: f64,
    pub action: ReconcileAction,
}

impl BindPlan {
    /// Offset as whole milliseconds, the unit `adelay` takes.
    pub fn offset_millis(&self) -> u64 {
        (self.offset_secs * 1000.0).round() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationReconciliationPolicy {
    /// Differences at or below this count as exact.
    pub tolerance_secs: f64,
}

impl Default for DurationReconciliationPolicy {
    fn default() -> Self {
        Self {
            tolerance_secs: 0.001,
        }
    }
}

impl DurationReconciliationPolicy {
    pub fn plan(&self, video_secs: f64, narration_secs: f64, offset_secs: f64) -> BindResult<BindPlan> {
        if !offset_secs.is_finite() || offset_secs < 0.0 {
            return Err(BindError::InvalidOffset(offset_secs));
        }
        if !video_secs.is_finite() || video_secs <= 0.0 {
            return Err(BindError::UnknownDuration("video"));
        }
        if !narration_secs.is_finite() || narration_secs <= 0.0 {
            return Err(BindError::UnknownDuration("narration"));
        }

        let span_secs = narration_secs + offset_secs;
        let difference = span_secs - video_secs;
        let action = if difference.abs() <= self.tolerance_secs {
            ReconcileAction::Exact
        } else if difference > 0.0 {
            ReconcileAction::Trim {
                excess_secs: difference,
            }
        } else {
            ReconcileAction::SilentTail {
                gap_secs: -difference,
            }
        };

        Ok(BindPlan {
            video_secs,
            narration_secs,
            offset_secs,
            span_secs,
            output_secs: video_secs,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn long_narration_is_trimmed_to_video() {
        let plan = DurationReconciliationPolicy::default()
            .plan(120.0, 140.0, 9.0)
            .unwrap();
        assert_eq!(plan.span_secs, 149.0);
        assert_eq!(plan.output_secs, 120.0);
        assert_eq!(plan.action, ReconcileAction::Trim { excess_secs: 29.0 });
        assert_eq!(plan.offset_millis(), 9000);
    }

    #[test]
    fn short_narration_gets_silent_tail() {
        let plan = DurationReconciliationPolicy::default()
            .plan(120.0, 100.0, 5.0)
            .unwrap();
        assert_eq!(plan.action, ReconcileAction::SilentTail { gap_secs: 15.0 });
        assert_eq!(plan.output_secs, 120.0);
    }

    #[test]
    fn matching_span_is_exact() {
        let plan = DurationReconciliationPolicy::default()
            .plan(60.0, 51.0005, 9.0)
            .unwrap();
        assert_eq!(plan.action, ReconcileAction::Exact);
    }

    #[test]
    fn rejects_negative_offset_and_unknown_durations() {
        let policy = DurationReconciliationPolicy::default();
        assert!(matches!(policy.plan(10.0, 5.0, -1.0), Err(BindError::InvalidOffset(_))));
        assert!(matches!(policy.plan(0.0, 5.0, 1.0), Err(BindError::UnknownDuration("video"))));
        assert!(matches!(
            policy.plan(10.0, f64::NAN, 1.0),
            Err(BindError::UnknownDuration("narration"))
        ));
    }

    proptest! {
        #[test]
        fn output_always_matches_video(video in 0.5f64..7200.0, narration in 0.5f64..7200.0, offset in 0.0f64..60.0) {
            let plan = DurationReconciliationPolicy::default().plan(video, narration, offset).unwrap();
            prop_assert_eq!(plan.output_secs, video);
            match plan.action {
                ReconcileAction::Trim { excess_secs } => prop_assert!(plan.span_secs > video && excess_secs > 0.0),
                ReconcileAction::SilentTail { gap_secs } => prop_assert!(plan.span_secs < video && gap_secs > 0.0),
                ReconcileAction::Exact => prop_assert!((plan.span_secs - video).abs() <= 0.001),
            }
        }
    }
}
