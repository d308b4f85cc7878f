//! Configuration management for the narrated video assembler.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Cross-field validation on load
//!
//! # Example
//!
//! ```no_run
//! use nva_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/nva.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Group size: {}", config.settings().merge.group_size);
//!
//! config.settings_mut().bind.offset_secs = 4.0;
//! config.update_section(ConfigSection::Bind).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    BindSettings, ConfigSection, LoggingSettings, MergeSettings, OverlaySettings, PathSettings,
    Settings, SubtitleSettings, ToolSettings,
};
