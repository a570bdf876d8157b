//! Script and scenario error types.

use thiserror::Error;

use crate::orchestrator::StepError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("Requested duration {requested}s is below the {minimum}s minimum")]
    DurationTooShort { requested: f64, minimum: f64 },

    #[error("Scenario '{0}' has no scenes with a positive duration")]
    EmptyScenario(String),
}

impl From<ScriptError> for StepError {
    fn from(err: ScriptError) -> Self {
        StepError::InvalidInput(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    /// The service cannot serve requests right now.
    #[error("{0}")]
    Unavailable(String),

    #[error("Scenario '{0}' not found")]
    NotFound(String),

    #[error("Missing API key: set {env_var}")]
    MissingApiKey { env_var: String },

    #[error("Scenario request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid scenario response: {0}")]
    InvalidResponse(String),
}

impl From<ScenarioError> for StepError {
    fn from(err: ScenarioError) -> Self {
        StepError::Collaborator(err.to_string())
    }
}
