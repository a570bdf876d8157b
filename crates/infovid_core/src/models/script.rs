//! Script types.

use serde::{Deserialize, Serialize};

/// One timed section of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub content: String,
    pub duration_secs: f64,
    #[serde(default)]
    pub visual_suggestions: Vec<String>,
    #[serde(default)]
    pub code_examples: Vec<String>,
}

/// The structured script every downstream step reads.
///
/// Timeline order is introduction, sections, conclusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub title: String,
    pub introduction: String,
    pub intro_duration_secs: f64,
    pub sections: Vec<Section>,
    pub conclusion: String,
    pub conclusion_duration_secs: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub total_duration_secs: f64,
}

impl Script {
    /// Intro + sections + conclusion, recomputed from the parts.
    pub fn computed_duration_secs(&self) -> f64 {
        self.intro_duration_secs
            + self.sections.iter().map(|s| s.duration_secs).sum::<f64>()
            + self.conclusion_duration_secs
    }

    /// Start offset of a section on the video timeline.
    pub fn section_start_secs(&self, index: usize) -> f64 {
        self.intro_duration_secs
            + self
                .sections
                .iter()
                .take(index)
                .map(|s| s.duration_secs)
                .sum::<f64>()
    }

    /// Short description used for video metadata.
    pub fn description(&self) -> String {
        let first_line = self.introduction.lines().next().unwrap_or("").trim();
        if first_line.is_empty() {
            self.title.clone()
        } else {
            first_line.to_string()
        }
    }
}
