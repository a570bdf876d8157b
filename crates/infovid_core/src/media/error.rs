//! Media error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::orchestrator::StepError;

#[derive(Error, Debug)]
pub enum MediaError {
    /// The tool binary could not be started.
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with code {exit_code}: {stderr}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Failed to parse ffprobe output: {0}")]
    Probe(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to process image '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl MediaError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type MediaResult<T> = Result<T, MediaError>;

impl From<MediaError> for StepError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::CommandFailed {
                tool,
                exit_code,
                stderr,
            } => StepError::command_failed(tool, exit_code, stderr),
            MediaError::Spawn { tool, source } => {
                StepError::io_error(format!("starting {}", tool), source)
            }
            MediaError::Io { path, source } => {
                StepError::io_error(path.display().to_string(), source)
            }
            MediaError::Probe(message) => StepError::parse_error("ffprobe output", message),
            MediaError::MissingInput(message) => StepError::invalid_input(message),
            other => StepError::other(other.to_string()),
        }
    }
}
