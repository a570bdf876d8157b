//! Configuration management for infovid.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Defaults for every missing key
//!
//! # Example
//!
//! ```no_run
//! use infovid_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/infovid.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Output folder: {}", config.settings().paths.output_folder);
//!
//! config.settings_mut().video.crf = 20;
//! config.update_section(ConfigSection::Video).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, LoggingSettings, PathSettings, QueueSettings, ScenarioSettings,
    ScriptSettings, Settings, SubtitleSettings, VideoSettings,
};
