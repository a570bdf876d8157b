//! Subtitle generation for rendered scripts.
//!
//! This module provides:
//! - Caption chunking at word boundaries with a character limit
//! - Timeline building over introduction, sections and conclusion
//! - SRT writing and parsing with integer millisecond timing
//! - Track validation (ordering, overlap, ids, gaps)

mod builder;
mod chunker;
mod error;
mod srt;
mod types;

pub use builder::SubtitleBuilder;
pub use chunker::chunk_text;
pub use error::{ParseError, SubtitleError};
pub use srt::{format_srt_time, parse_srt, parse_srt_time, write_srt};
pub use types::{SubtitleSegment, SubtitleTrack};
