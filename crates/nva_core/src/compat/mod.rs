//! Clip compatibility analysis.
//!
//! Compares the descriptors of a set of clips and reports whether they can
//! be concatenated losslessly. Pure: no I/O happens here.

mod analyzer;
mod report;

pub use analyzer::{analyze, analyze_descriptors, FPS_DIVERGENCE_TOLERANCE};
pub use report::{CompatibilityReport, FileFinding, FileIssue};
