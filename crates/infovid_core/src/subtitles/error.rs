//! Subtitle error types.

use std::path::PathBuf;

use crate::orchestrator::StepError;

/// Errors that can occur during subtitle operations.
#[derive(Debug, thiserror::Error)]
pub enum SubtitleError {
    /// Failed to read subtitle file.
    #[error("Failed to read file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write subtitle file.
    #[error("Failed to write file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// A generated track broke a timing or text rule.
    #[error("Invalid segment {id}: {message}")]
    InvalidSegment { id: u32, message: String },

    /// Script produced no caption text at all.
    #[error("Script has no text to caption")]
    Empty,
}

impl SubtitleError {
    pub fn invalid(id: u32, message: impl Into<String>) -> Self {
        Self::InvalidSegment {
            id,
            message: message.into(),
        }
    }
}

impl From<SubtitleError> for StepError {
    fn from(err: SubtitleError) -> Self {
        match err {
            SubtitleError::WriteError { path, source }
            | SubtitleError::ReadError { path, source } => {
                StepError::io_error(format!("subtitle file {}", path.display()), source)
            }
            SubtitleError::ParseError(e) => StepError::parse_error("SRT", e.to_string()),
            other => StepError::invalid_output(other.to_string()),
        }
    }
}

/// Errors that can occur during SRT parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid time format at line {line}: '{value}'")]
    InvalidTime { line: usize, value: String },

    #[error("Invalid index at line {line}: '{value}'")]
    InvalidIndex { line: usize, value: String },
}

impl ParseError {
    pub fn invalid_time(line: usize, value: impl Into<String>) -> Self {
        Self::InvalidTime {
            line,
            value: value.into(),
        }
    }
}
