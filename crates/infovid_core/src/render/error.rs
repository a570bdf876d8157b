//! Render error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::orchestrator::StepError;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid card size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

impl From<RenderError> for StepError {
    fn from(err: RenderError) -> Self {
        StepError::Render(err.to_string())
    }
}
