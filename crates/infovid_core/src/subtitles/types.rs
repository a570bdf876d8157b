//! Subtitle segment and track types.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::SubtitleError;
use super::srt::write_srt;
use crate::config::SubtitleSettings;

/// One caption with integer millisecond timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    /// 1-based, contiguous across the track.
    pub id: u32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl SubtitleSegment {
    pub fn new(id: u32, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Ordered list of captions for one video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub segments: Vec<SubtitleSegment>,
}

impl SubtitleTrack {
    pub fn new(segments: Vec<SubtitleSegment>) -> Self {
        Self { segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// End of the last caption, 0 for an empty track.
    pub fn last_end_ms(&self) -> u64 {
        self.segments.last().map(|s| s.end_ms).unwrap_or(0)
    }

    /// Largest silence between consecutive captions.
    pub fn max_gap_ms(&self) -> u64 {
        self.segments
            .windows(2)
            .map(|w| w[1].start_ms.saturating_sub(w[0].end_ms))
            .max()
            .unwrap_or(0)
    }

    /// Check ordering, overlap, id contiguity, text length and gaps.
    pub fn validate(&self, limits: &SubtitleSettings) -> Result<(), SubtitleError> {
        let mut prev_end: Option<u64> = None;

        for (i, seg) in self.segments.iter().enumerate() {
            let expected_id = i as u32 + 1;
            if seg.id != expected_id {
                return Err(SubtitleError::invalid(
                    seg.id,
                    format!("expected id {}", expected_id),
                ));
            }
            if seg.end_ms <= seg.start_ms {
                return Err(SubtitleError::invalid(seg.id, "end is not after start"));
            }
            if seg.text.trim().is_empty() {
                return Err(SubtitleError::invalid(seg.id, "empty text"));
            }
            let chars = seg.text.chars().count();
            if chars > limits.max_chars {
                return Err(SubtitleError::invalid(
                    seg.id,
                    format!("{} chars exceeds limit of {}", chars, limits.max_chars),
                ));
            }
            if let Some(prev_end) = prev_end {
                if seg.start_ms < prev_end {
                    return Err(SubtitleError::invalid(seg.id, "overlaps previous segment"));
                }
                let gap = seg.start_ms - prev_end;
                if gap > limits.max_gap_ms {
                    return Err(SubtitleError::invalid(
                        seg.id,
                        format!("gap of {}ms exceeds {}ms", gap, limits.max_gap_ms),
                    ));
                }
            }
            prev_end = Some(seg.end_ms);
        }

        Ok(())
    }

    pub fn to_srt(&self) -> String {
        write_srt(&self.segments)
    }

    /// Write the track as SRT to `path`.
    pub fn write_srt_file(&self, path: &Path) -> Result<(), SubtitleError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SubtitleError::WriteError {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.to_srt()).map_err(|source| SubtitleError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}
