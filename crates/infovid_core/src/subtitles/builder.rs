//! Timeline building from a script.
//!
//! The script is laid out as consecutive blocks (introduction, each section,
//! conclusion). Every block is chunked into captions and each caption gets a
//! share of the block window proportional to its character count.

use super::chunker::chunk_text;
use super::error::SubtitleError;
use super::types::{SubtitleSegment, SubtitleTrack};
use crate::config::SubtitleSettings;
use crate::models::Script;

/// Builds a subtitle track from a script.
#[derive(Debug, Clone, Default)]
pub struct SubtitleBuilder {
    settings: SubtitleSettings,
}

/// One contiguous piece of the timeline.
struct Block<'a> {
    text: &'a str,
    duration_secs: f64,
}

impl SubtitleBuilder {
    pub fn new(settings: SubtitleSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SubtitleSettings {
        &self.settings
    }

    /// Lay out captions for the whole script.
    ///
    /// Blocks with empty text fall back to the section (or script) title so
    /// the timeline has no uncaptioned holes.
    pub fn build(&self, script: &Script) -> Result<SubtitleTrack, SubtitleError> {
        let mut blocks = Vec::with_capacity(script.sections.len() + 2);
        blocks.push(Block {
            text: non_blank_or(&script.introduction, &script.title),
            duration_secs: script.intro_duration_secs,
        });
        for section in &script.sections {
            blocks.push(Block {
                text: non_blank_or(&section.content, &section.title),
                duration_secs: section.duration_secs,
            });
        }
        blocks.push(Block {
            text: non_blank_or(&script.conclusion, &script.title),
            duration_secs: script.conclusion_duration_secs,
        });

        let mut segments = Vec::new();
        let mut elapsed_secs = 0.0f64;

        for block in blocks {
            let window_start = secs_to_ms(elapsed_secs);
            elapsed_secs += block.duration_secs.max(0.0);
            let window_end = secs_to_ms(elapsed_secs);

            self.layout_block(block.text, window_start, window_end, &mut segments);
        }

        if segments.is_empty() {
            return Err(SubtitleError::Empty);
        }

        Ok(SubtitleTrack::new(segments))
    }

    /// Spread the chunks of one block over `[window_start, window_end)`.
    fn layout_block(
        &self,
        text: &str,
        window_start: u64,
        window_end: u64,
        segments: &mut Vec<SubtitleSegment>,
    ) {
        if window_end <= window_start {
            return;
        }
        let chunks = chunk_text(text, self.settings.max_chars);
        let total_chars: u64 = chunks.iter().map(|c| c.chars().count() as u64).sum();
        if total_chars == 0 {
            return;
        }

        let width = window_end - window_start;
        let mut consumed = 0u64;

        for chunk in chunks {
            let start = window_start + width * consumed / total_chars;
            consumed += chunk.chars().count() as u64;
            let slot_end = window_start + width * consumed / total_chars;
            if slot_end <= start {
                continue;
            }

            let slot = slot_end - start;
            let end = if slot > self.settings.gap_ms {
                slot_end - self.settings.gap_ms
            } else {
                start + (slot / 2).max(1)
            };

            let id = segments.len() as u32 + 1;
            segments.push(SubtitleSegment::new(id, start, end, chunk));
        }
    }
}

fn non_blank_or<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.trim().is_empty() {
        fallback
    } else {
        text
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}
