//! NVA Core - media assembly decisions for the narrated video assembler
//!
//! This crate decides how clips are merged, repairs subtitle timelines,
//! binds narration and attaches subtitles, supervising an external
//! transcoding engine for every step. It has no CLI dependencies.

pub mod bind;
pub mod compat;
pub mod config;
pub mod engine;
pub mod inspect;
pub mod logging;
pub mod merge;
pub mod models;
pub mod orchestrator;
pub mod overlay;
pub mod subtitles;

#[cfg(test)]
pub(crate) mod testing;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
