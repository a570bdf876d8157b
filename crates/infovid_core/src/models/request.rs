//! Generation request types.

use serde::{Deserialize, Serialize};

/// Audience the video is pitched at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl AudienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudienceLevel::Beginner => "beginner",
            AudienceLevel::Intermediate => "intermediate",
            AudienceLevel::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for AudienceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature flags attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Keep code examples from the scenario in the script.
    #[serde(default)]
    pub include_code_examples: bool,

    /// Append a short quiz section.
    #[serde(default)]
    pub include_quiz: bool,

    /// Mix the configured background music track under the video.
    #[serde(default)]
    pub background_music: bool,

    /// Add the upload step after synthesis.
    #[serde(default)]
    pub auto_upload: bool,

    /// Ask the scenario collaborator to write a scenario from the topic.
    #[serde(default = "default_true")]
    pub generate_scenario: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            include_code_examples: false,
            include_quiz: false,
            background_music: false,
            auto_upload: false,
            generate_scenario: true,
        }
    }
}

/// A request to generate one video.
///
/// Immutable once a workflow has been started for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub project_id: String,
    pub user_id: String,

    /// Existing scenario to build the script from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,

    /// Topic for scenario generation or the built-in template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Requested total duration in seconds.
    pub duration_secs: u32,

    #[serde(default)]
    pub target_audience: AudienceLevel,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_style")]
    pub style: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub options: GenerationOptions,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_style() -> String {
    "modern".to_string()
}

impl GenerationRequest {
    /// Create a topic-driven request with default options.
    pub fn for_topic(topic: impl Into<String>, duration_secs: u32) -> Self {
        Self {
            project_id: String::new(),
            user_id: String::new(),
            scenario_id: None,
            topic: Some(topic.into()),
            duration_secs,
            target_audience: AudienceLevel::default(),
            language: default_language(),
            style: default_style(),
            keywords: Vec::new(),
            options: GenerationOptions::default(),
        }
    }

    /// Topic with surrounding whitespace removed, if non-blank.
    pub fn topic(&self) -> Option<&str> {
        self.topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}
