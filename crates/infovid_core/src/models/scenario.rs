//! Scenario types produced by the scenario collaborator.

use serde::{Deserialize, Serialize};

use super::request::AudienceLevel;

/// How a scene wants to be visualised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualType {
    #[default]
    Infographic,
    Diagram,
    Chart,
    Code,
    Text,
}

impl VisualType {
    pub fn label(&self) -> &'static str {
        match self {
            VisualType::Infographic => "Infographic",
            VisualType::Diagram => "Diagram",
            VisualType::Chart => "Chart",
            VisualType::Code => "Code walkthrough",
            VisualType::Text => "Key text",
        }
    }
}

/// One scene of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub title: String,
    pub content: String,
    pub duration_secs: f64,
    #[serde(default)]
    pub visual_type: VisualType,
    #[serde(default)]
    pub visual_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_example: Option<String>,
}

/// A storyboard the script step turns into a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    pub scenes: Vec<Scene>,
}

impl Scenario {
    /// Sum of scene durations.
    pub fn total_duration_secs(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration_secs).sum()
    }
}

/// Parameters for asking the collaborator to write a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    pub topic: String,
    pub duration_secs: u32,
    pub target_audience: AudienceLevel,
    pub language: String,
    pub style: String,
    pub keywords: Vec<String>,
    pub include_code_examples: bool,
}
