//! Error types for the orchestrator and its steps.
//!
//! Errors carry context that chains through layers:
//! Workflow → Step → Operation → Detail

use std::io;

use thiserror::Error;

use crate::queue::QueueError;
use crate::workflow::StoreError;

/// Errors returned by orchestrator entry points.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The request was rejected before anything was created.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Workflow store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// The scenario collaborator failed while resolving a scenario.
    #[error("Scenario lookup failed: {0}")]
    Scenario(String),
}

impl OrchestratorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Error from a pipeline step with operation context.
///
/// The display string is what ends up in the step's `error` field.
#[derive(Error, Debug)]
pub enum StepError {
    /// Input validation failed. Not retried.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// An external command failed.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Parsing error (JSON, ffprobe output, timestamps).
    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("Render failed: {0}")]
    Render(String),

    /// An external collaborator (scenario service, uploader) failed.
    #[error("{0}")]
    Collaborator(String),

    #[error("{0}")]
    Other(String),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn command_failed(
        tool: impl Into<String>,
        exit_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn parse_error(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether the queue should try the job again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StepError::InvalidInput(_) | StepError::InvalidOutput(_))
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_displays_context() {
        let err = StepError::command_failed("ffmpeg", 1, "Invalid data found");
        let msg = err.to_string();
        assert!(msg.contains("ffmpeg"));
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("Invalid data found"));
    }

    #[test]
    fn other_displays_bare_message() {
        assert_eq!(StepError::other("LLM unavailable").to_string(), "LLM unavailable");
    }

    #[test]
    fn input_errors_are_not_retried() {
        assert!(!StepError::invalid_input("too short").is_retryable());
        assert!(StepError::other("timeout").is_retryable());
    }
}
