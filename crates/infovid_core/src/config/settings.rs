//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Output, scratch, log and publish directories.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Job queue behaviour.
    #[serde(default)]
    pub queue: QueueSettings,

    /// Script template settings.
    #[serde(default)]
    pub script: ScriptSettings,

    /// Caption chunking settings.
    #[serde(default)]
    pub subtitles: SubtitleSettings,

    /// Encoding settings.
    #[serde(default)]
    pub video: VideoSettings,

    /// Scenario generation (chat-completions API).
    #[serde(default)]
    pub scenario: ScenarioSettings,
}

/// Path configuration for output, temp, logs and publishing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder for videos, thumbnails and subtitle files.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for per-workflow scratch files.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for per-workflow log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Folder the local uploader publishes into.
    #[serde(default = "default_publish_folder")]
    pub publish_folder: String,

    /// Folder for persisted workflow records (empty keeps them in memory).
    #[serde(default)]
    pub workflows_folder: String,
}

fn default_output_folder() -> String {
    "output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_publish_folder() -> String {
    "published".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
            publish_folder: default_publish_folder(),
            workflows_folder: String::new(),
        }
    }
}

impl PathSettings {
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_folder)
    }

    pub fn temp_dir(&self) -> PathBuf {
        PathBuf::from(&self.temp_root)
    }

    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.logs_folder)
    }

    pub fn publish_dir(&self) -> PathBuf {
        PathBuf::from(&self.publish_folder)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use compact log format in workflow logs.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Number of lines kept for the error tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Write a log file per workflow.
    #[serde(default = "default_true")]
    pub workflow_logs: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u32 {
    20
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
            workflow_logs: true,
        }
    }
}

/// Job queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Attempts per job, including the first one.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// First retry delay; doubles on each further attempt.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Jobs executed at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    2000
}

fn default_concurrency() -> usize {
    2
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
            concurrency: default_concurrency(),
        }
    }
}

impl QueueSettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Built-in script template configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSettings {
    /// Seconds reserved for the introduction.
    #[serde(default = "default_bookend_secs")]
    pub intro_secs: f64,

    /// Seconds reserved for the conclusion.
    #[serde(default = "default_bookend_secs")]
    pub conclusion_secs: f64,

    /// Allowed drift between script duration and the request.
    #[serde(default = "default_tolerance")]
    pub duration_tolerance_secs: f64,
}

fn default_bookend_secs() -> f64 {
    10.0
}

fn default_tolerance() -> f64 {
    5.0
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            intro_secs: default_bookend_secs(),
            conclusion_secs: default_bookend_secs(),
            duration_tolerance_secs: default_tolerance(),
        }
    }
}

/// Caption chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleSettings {
    /// Maximum characters per caption.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Gap left before the next caption starts.
    #[serde(default = "default_gap_ms")]
    pub gap_ms: u64,

    /// Largest gap tolerated between consecutive captions.
    #[serde(default = "default_max_gap_ms")]
    pub max_gap_ms: u64,
}

fn default_max_chars() -> usize {
    40
}

fn default_gap_ms() -> u64 {
    100
}

fn default_max_gap_ms() -> u64 {
    200
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            gap_ms: default_gap_ms(),
            max_gap_ms: default_max_gap_ms(),
        }
    }
}

/// Encoding configuration. Fixed per deployment, not per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_fps")]
    pub fps: u32,

    /// FFmpeg video encoder.
    #[serde(default = "default_codec")]
    pub codec: String,

    /// Constant rate factor.
    #[serde(default = "default_crf")]
    pub crf: u32,

    /// Encoder preset.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Thumbnail position as percentage of the duration.
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset_pct: f64,

    /// Burn captions into the picture instead of muxing a subtitle track.
    #[serde(default)]
    pub burn_subtitles: bool,

    /// Audio file looped under the video when background music is requested.
    #[serde(default)]
    pub background_music: String,

    /// FFmpeg binary.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    /// FFprobe binary.
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_fps() -> u32 {
    30
}

fn default_codec() -> String {
    "libx264".to_string()
}

fn default_crf() -> u32 {
    23
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_thumbnail_offset() -> f64 {
    10.0
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            codec: default_codec(),
            crf: default_crf(),
            preset: default_preset(),
            thumbnail_offset_pct: default_thumbnail_offset(),
            burn_subtitles: false,
            background_music: String::new(),
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
        }
    }
}

impl VideoSettings {
    /// `1920x1080` style resolution tag.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Scenario generation over an OpenAI-compatible chat API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSettings {
    /// Use the LLM-backed scenario service.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Price per 1K tokens, used for the cost estimate.
    #[serde(default = "default_price_per_1k")]
    pub price_per_1k_tokens: f64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_price_per_1k() -> f64 {
    0.0006
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_api_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            price_per_1k_tokens: default_price_per_1k(),
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Queue,
    Script,
    Subtitles,
    Video,
    Scenario,
}

impl ConfigSection {
    pub const ALL: [ConfigSection; 7] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Queue,
        ConfigSection::Script,
        ConfigSection::Subtitles,
        ConfigSection::Video,
        ConfigSection::Scenario,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Queue => "queue",
            ConfigSection::Script => "script",
            ConfigSection::Subtitles => "subtitles",
            ConfigSection::Video => "video",
            ConfigSection::Scenario => "scenario",
        }
    }

    /// Comment written above the table in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output and working directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Queue => "Job queue: attempts, backoff, concurrency",
            ConfigSection::Script => "Built-in script template",
            ConfigSection::Subtitles => "Caption chunking",
            ConfigSection::Video => "Encoding (fixed per deployment)",
            ConfigSection::Scenario => "Scenario generation API",
        }
    }
}
