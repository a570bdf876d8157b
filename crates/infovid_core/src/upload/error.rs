//! Upload error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::orchestrator::StepError;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Video file not found: {0}")]
    MissingArtifact(PathBuf),

    #[error("Failed to copy '{from}' to '{to}': {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload rejected: {0}")]
    Rejected(String),
}

impl From<UploadError> for StepError {
    fn from(err: UploadError) -> Self {
        StepError::Collaborator(err.to_string())
    }
}
