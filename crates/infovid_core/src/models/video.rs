//! Terminal artifacts: the encoded video and its upload descriptor.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stream reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub index: u32,
    pub codec_type: String,
    pub codec_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Container-level facts read back from the encoded file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub duration_secs: f64,
    pub bit_rate: Option<u64>,
    pub size_bytes: Option<u64>,
    pub format_name: String,
    pub streams: Vec<StreamInfo>,
}

impl MediaProbe {
    /// First video stream, if any.
    pub fn video_stream(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.codec_type == "video")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub cost_usd: f64,
    pub probe: MediaProbe,
}

/// The encoded video produced by the synthesis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResult {
    /// Same as the workflow id.
    pub video_id: String,
    pub project_id: String,
    pub user_id: String,
    pub path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub duration_secs: f64,
    pub file_size: u64,
    pub format: String,
    pub resolution: String,
    pub subtitle_paths: Vec<PathBuf>,
    pub infographic_paths: Vec<PathBuf>,
    pub metadata: VideoMetadata,
}

/// Where the upload step published the video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDescriptor {
    pub platform: String,
    pub remote_id: String,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}
