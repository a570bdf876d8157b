//! SRT writing and parsing.
//!
//! SRT files consist of sequential entries:
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:04,000
//! Hello, world!
//!
//! 2
//! 00:00:05,000 --> 00:00:08,000
//! This is a test.
//! ```
//!
//! Timing is kept as integer milliseconds on both sides, so a written track
//! parses back to identical start/end values.

use super::error::ParseError;
use super::types::SubtitleSegment;

/// Serialize segments to SRT. Entries are separated by a blank line.
pub fn write_srt(segments: &[SubtitleSegment]) -> String {
    let mut output = String::new();

    for (i, seg) in segments.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        output.push_str(&format!("{}\n", seg.id));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(seg.start_ms),
            format_srt_time(seg.end_ms)
        ));
        output.push_str(&seg.text);
        output.push('\n');
    }

    output
}

/// Format milliseconds as an SRT timestamp (`HH:MM:SS,mmm`).
pub fn format_srt_time(ms: u64) -> String {
    let millis = ms % 1000;
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

/// Parse SRT content into segments.
///
/// A missing index line is tolerated; the segment is numbered by position.
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleSegment>, ParseError> {
    let content = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut segments = Vec::new();
    let mut line_offset = 0;

    for block in content.split("\n\n") {
        let lines: Vec<&str> = block.lines().collect();
        let block_len = lines.len();
        let trimmed: Vec<&str> = lines
            .iter()
            .copied()
            .skip_while(|l| l.trim().is_empty())
            .collect();
        let leading_blank = block_len - trimmed.len();

        let Some(timing_idx) = trimmed.iter().position(|l| l.contains(" --> ")) else {
            line_offset += block_len + 1;
            continue;
        };
        let timing_line = trimmed[timing_idx];
        let timing_line_num = line_offset + leading_blank + timing_idx + 1;

        let (start_ms, end_ms) = parse_srt_timing(timing_line)
            .ok_or_else(|| ParseError::invalid_time(timing_line_num, timing_line))?;

        let id = if timing_idx > 0 {
            let raw = trimmed[timing_idx - 1].trim();
            raw.parse::<u32>().map_err(|_| ParseError::InvalidIndex {
                line: timing_line_num - 1,
                value: raw.to_string(),
            })?
        } else {
            segments.len() as u32 + 1
        };

        let text = trimmed[timing_idx + 1..]
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
        let text = text.trim_end().to_string();

        if !text.is_empty() {
            segments.push(SubtitleSegment::new(id, start_ms, end_ms, text));
        }

        line_offset += block_len + 1;
    }

    Ok(segments)
}

/// Parse an SRT timing line: `HH:MM:SS,mmm --> HH:MM:SS,mmm`.
fn parse_srt_timing(line: &str) -> Option<(u64, u64)> {
    let (start, end) = line.split_once(" --> ")?;
    Some((parse_srt_time(start)?, parse_srt_time(end)?))
}

/// Parse an SRT timestamp (`HH:MM:SS,mmm` or `HH:MM:SS.mmm`) into milliseconds.
pub fn parse_srt_time(s: &str) -> Option<u64> {
    let s = s.trim().replace(',', ".");

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: u64 = parts[0].parse().ok()?;
    let minutes: u64 = parts[1].parse().ok()?;

    let (secs_str, frac) = parts[2].split_once('.').unwrap_or((parts[2], ""));
    let seconds: u64 = secs_str.parse().ok()?;

    let millis: u64 = if frac.is_empty() {
        0
    } else {
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        // Normalise to exactly three digits
        let padded: String = frac.chars().chain("000".chars()).take(3).collect();
        padded.parse().ok()?
    };

    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis)
}
