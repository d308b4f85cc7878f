//! Core enums used throughout the assembler.

use serde::{Deserialize, Serialize};

/// How a set of clips is concatenated.
///
/// Leaf strategies are ordered by cost and safety:
/// `StreamCopy < Reencode < NormalizeConcat`. `Batched` wraps the leaves
/// and is never handed to the engine directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Concat demuxer with stream copy. Only valid for uniform inputs.
    StreamCopy,
    /// Concat demuxer with a full re-encode at a fixed output rate.
    Reencode,
    /// Every input scaled, padded and frame-rate converted before concat.
    NormalizeConcat,
    /// Contiguous groups merged first, then the group outputs.
    Batched,
}

impl MergeStrategy {
    /// Whether this strategy maps to a single engine invocation.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, MergeStrategy::Batched)
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeStrategy::StreamCopy => write!(f, "stream copy"),
            MergeStrategy::Reencode => write!(f, "re-encode"),
            MergeStrategy::NormalizeConcat => write!(f, "normalize + concat"),
            MergeStrategy::Batched => write!(f, "batched"),
        }
    }
}

/// Lifecycle of one supervised engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Running,
    Succeeded,
    Failed,
    /// Budget expired and the engine was stopped by the guard.
    TimedOut,
    /// The engine was terminated by something other than the guard.
    Cancelled,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::Running)
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStatus::Running => write!(f, "running"),
            AttemptStatus::Succeeded => write!(f, "succeeded"),
            AttemptStatus::Failed => write!(f, "failed"),
            AttemptStatus::TimedOut => write!(f, "timed out"),
            AttemptStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Coarse classification of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Decoder/encoder problems (unsupported or broken streams).
    Codec,
    /// Container, demuxer or timestamp problems.
    Format,
    /// The attempt exceeded its budget.
    Timeout,
    Unknown,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Codec => write!(f, "codec"),
            ErrorClass::Format => write!(f, "format"),
            ErrorClass::Timeout => write!(f, "timeout"),
            ErrorClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// How a subtitle track is attached to the assembled video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayMethod {
    /// Rendered into the picture (video re-encoded).
    #[default]
    Hardburn,
    /// Soft subtitle stream inside the container.
    Embed,
    /// `.srt` file placed next to the output.
    Sidecar,
}

impl OverlayMethod {
    /// This method followed by every method that is cheaper to get right.
    pub fn chain_from(self) -> Vec<OverlayMethod> {
        let all = [
            OverlayMethod::Hardburn,
            OverlayMethod::Embed,
            OverlayMethod::Sidecar,
        ];
        all.into_iter().skip_while(|m| *m != self).collect()
    }
}

impl std::fmt::Display for OverlayMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayMethod::Hardburn => write!(f, "hardburn"),
            OverlayMethod::Embed => write!(f, "embed"),
            OverlayMethod::Sidecar => write!(f, "sidecar"),
        }
    }
}

impl std::str::FromStr for OverlayMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hardburn" | "burn" => Ok(OverlayMethod::Hardburn),
            "embed" | "soft" => Ok(OverlayMethod::Embed),
            "sidecar" | "external" => Ok(OverlayMethod::Sidecar),
            other => Err(format!("unknown overlay method '{}'", other)),
        }
    }
}
