//! Script generation.
//!
//! This module provides:
//! - `ScriptGenerator`: scenario-to-script mapping and the built-in template
//! - `ScenarioService`: the seam to whatever stores or writes scenarios
//! - `LlmScenarioService`: scenario writing over an OpenAI-compatible chat API

mod error;
mod generator;
mod llm;
mod scenario;

pub use error::{ScenarioError, ScriptError};
pub use generator::ScriptGenerator;
pub use llm::LlmScenarioService;
pub use scenario::{GeneratedScenario, ScenarioService, StaticScenarioService};
