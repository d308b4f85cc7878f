//! Derives a [`CompatibilityReport`] from inspection results.

use std::collections::BTreeSet;

use super::report::{CompatibilityReport, FileFinding, FileIssue};
use crate::inspect::Inspection;
use crate::models::MediaDescriptor;

/// Declared and measured frame rate may differ by this much before the
/// stream counts as variable frame rate.
pub const FPS_DIVERGENCE_TOLERANCE: f64 = 0.1;

/// Analyze a set of inspected inputs.
///
/// A single unreadable or unknown file makes the whole set maximally unsafe:
/// every flag is raised so the selector falls through to normalization.
pub fn analyze(inspections: &[Inspection]) -> CompatibilityReport {
    let mut report = CompatibilityReport {
        input_count: inspections.len(),
        total_bytes: inspections.iter().map(|i| i.byte_size).sum(),
        ..CompatibilityReport::default()
    };

    let mut readable = Vec::with_capacity(inspections.len());
    for inspection in inspections {
        match &inspection.outcome {
            Ok(descriptor) => {
                if let Some(reason) = unreliable_reason(descriptor) {
                    report.findings.push(FileFinding {
                        path: inspection.path.clone(),
                        issue: FileIssue::Unknown { reason },
                    });
                } else {
                    readable.push(descriptor);
                }
            }
            Err(e) => report.findings.push(FileFinding {
                path: inspection.path.clone(),
                issue: FileIssue::Unreadable {
                    reason: e.to_string(),
                },
            }),
        }
    }

    compare(&readable, &mut report);

    if report.has_findings() {
        report.frame_rate_mismatch = true;
        report.resolution_mismatch = true;
        report.codec_mismatch = true;
        report.timing_anomaly = true;
    }

    report
}

/// Analyze descriptors that were inspected successfully.
pub fn analyze_descriptors(descriptors: &[MediaDescriptor]) -> CompatibilityReport {
    let inspections: Vec<Inspection> = descriptors
        .iter()
        .map(|d| Inspection {
            path: d.path.clone(),
            byte_size: d.byte_size,
            outcome: Ok(d.clone()),
        })
        .collect();
    analyze(&inspections)
}

fn compare(readable: &[&MediaDescriptor], report: &mut CompatibilityReport) {
    let frame_rates: BTreeSet<u32> = readable.iter().map(|d| d.rounded_fps()).collect();
    let resolutions: BTreeSet<(u32, u32)> = readable.iter().map(|d| d.resolution()).collect();
    let codecs: BTreeSet<(String, Option<String>)> =
        readable.iter().map(|d| d.codec_pair()).collect();

    report.frame_rate_mismatch = frame_rates.len() > 1;
    report.resolution_mismatch = resolutions.len() > 1;
    report.codec_mismatch = codecs.len() > 1;
    report.timing_anomaly = readable
        .iter()
        .any(|d| d.has_start_offset() || d.frame_rate_divergence() > FPS_DIVERGENCE_TOLERANCE);

    report.frame_rates = frame_rates.into_iter().collect();
    report.resolutions = resolutions.into_iter().collect();
    report.codecs = codecs.into_iter().collect();
}

fn unreliable_reason(descriptor: &MediaDescriptor) -> Option<String> {
    if descriptor.video_codec.is_empty() {
        Some("no video stream".to_string())
    } else if descriptor.width == 0 || descriptor.height == 0 {
        Some("unknown resolution".to_string())
    } else if !descriptor.has_reliable_metadata() {
        Some("unknown frame rate".to_string())
    } else {
        None
    }
}
