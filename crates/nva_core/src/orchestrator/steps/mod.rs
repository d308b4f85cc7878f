//! Assembly pipeline steps.

mod bind;
mod finalize;
mod merge;
mod overlay;
mod subtitles;

pub use bind::BindStep;
pub use finalize::FinalizeStep;
pub use merge::MergeStep;
pub use overlay::OverlayStep;
pub use subtitles::SubtitlesStep;
