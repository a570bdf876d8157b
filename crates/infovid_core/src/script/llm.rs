//! Scenario writing over an OpenAI-compatible chat-completions API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::ScenarioError;
use super::scenario::{GeneratedScenario, ScenarioService};
use crate::config::ScenarioSettings;
use crate::models::{Scenario, ScenarioParams, Scene};

/// LLM-backed `ScenarioService`. Stored lookups are not supported.
pub struct LlmScenarioService {
    client: reqwest::Client,
    api_url: String,
    model: String,
    api_key: String,
    price_per_1k_tokens: f64,
}

/// Shape the model is asked to return.
#[derive(Debug, Deserialize)]
struct ScenarioDraft {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    introduction: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    scenes: Vec<Scene>,
}

impl LlmScenarioService {
    /// Build from settings, reading the API key from the configured variable.
    pub fn from_settings(settings: &ScenarioSettings) -> Result<Self, ScenarioError> {
        let api_key =
            std::env::var(&settings.api_key_env).map_err(|_| ScenarioError::MissingApiKey {
                env_var: settings.api_key_env.clone(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: settings.api_url.clone(),
            model: settings.model.clone(),
            api_key,
            price_per_1k_tokens: settings.price_per_1k_tokens,
        })
    }

    fn system_prompt(params: &ScenarioParams) -> String {
        format!(
            r#"You write storyboards for short educational explainer videos.

Write ALL text in {lang} language. Audience level: {audience}. Visual style: {style}.

You MUST output ONLY valid JSON matching this exact structure (no markdown, no explanation):
{{
  "title": "Video title",
  "description": "One sentence description",
  "introduction": "What the narrator says in the opening",
  "conclusion": "What the narrator says at the end",
  "scenes": [
    {{"title": "Scene title", "content": "Narration for the scene", "duration_secs": 30,
      "visual_type": "infographic|diagram|chart|code|text", "visual_prompt": "What to show",
      "code_example": null}}
  ]
}}

Rules:
- Scene durations must add up to about {scene_secs} seconds
- Use 3-6 scenes
- {code_rule}
- Output ONLY the JSON, nothing else"#,
            lang = params.language,
            audience = params.target_audience,
            style = params.style,
            scene_secs = params.duration_secs.saturating_sub(20),
            code_rule = if params.include_code_examples {
                "Add a short code_example to scenes where code helps"
            } else {
                "Set code_example to null"
            },
        )
    }

    fn user_prompt(params: &ScenarioParams) -> String {
        let mut prompt = format!(
            "Topic: {}\nTotal length: {} seconds",
            params.topic, params.duration_secs
        );
        if !params.keywords.is_empty() {
            prompt.push_str(&format!("\nCover these keywords: {}", params.keywords.join(", ")));
        }
        prompt
    }
}

/// Pull the scenario out of a chat-completions response body.
fn parse_response(response: &serde_json::Value) -> Result<(Scenario, u64), ScenarioError> {
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ScenarioError::InvalidResponse("missing message content".to_string()))?;

    let draft: ScenarioDraft = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| ScenarioError::InvalidResponse(e.to_string()))?;
    if draft.scenes.is_empty() {
        return Err(ScenarioError::InvalidResponse("no scenes".to_string()));
    }

    let tokens = response["usage"]["total_tokens"].as_u64().unwrap_or(0);
    let scenario = Scenario {
        id: uuid::Uuid::new_v4().to_string(),
        title: draft.title,
        description: draft.description,
        introduction: draft.introduction,
        conclusion: draft.conclusion,
        scenes: draft.scenes,
    };
    Ok((scenario, tokens))
}

/// Models sometimes wrap JSON in a markdown fence despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl ScenarioService for LlmScenarioService {
    async fn get_scenario(&self, _id: &str) -> Result<Option<Scenario>, ScenarioError> {
        Ok(None)
    }

    async fn generate_scenario(
        &self,
        params: &ScenarioParams,
    ) -> Result<GeneratedScenario, ScenarioError> {
        tracing::info!("Requesting scenario for '{}' from {}", params.topic, self.model);

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": Self::system_prompt(params) },
                    { "role": "user", "content": Self::user_prompt(params) },
                ],
                "temperature": 0.4,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        let (scenario, tokens) = parse_response(&response)?;
        let cost_usd = tokens as f64 / 1000.0 * self.price_per_1k_tokens;
        tracing::debug!("Scenario used {} tokens (${:.4})", tokens, cost_usd);

        Ok(GeneratedScenario { scenario, cost_usd })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudienceLevel, VisualType};

    fn response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "content": content } }],
            "usage": { "total_tokens": 1500 }
        })
    }

    const DRAFT: &str = r#"{
        "title": "Docker in two minutes",
        "introduction": "Containers, explained.",
        "scenes": [
            {"title": "Images", "content": "Images are templates.", "duration_secs": 40,
             "visual_type": "diagram", "visual_prompt": "layer stack"},
            {"title": "Run", "content": "Start a container.", "duration_secs": 60,
             "visual_type": "code", "code_example": "docker run hello-world"}
        ]
    }"#;

    #[test]
    fn parses_plain_json_content() {
        let (scenario, tokens) = parse_response(&response(DRAFT)).unwrap();
        assert_eq!(scenario.title, "Docker in two minutes");
        assert_eq!(scenario.scenes.len(), 2);
        assert_eq!(scenario.scenes[0].visual_type, VisualType::Diagram);
        assert_eq!(
            scenario.scenes[1].code_example.as_deref(),
            Some("docker run hello-world")
        );
        assert_eq!(tokens, 1500);
    }

    #[test]
    fn strips_markdown_fence() {
        let fenced = format!("```json\n{}\n```", DRAFT);
        assert!(parse_response(&response(&fenced)).is_ok());
    }

    #[test]
    fn rejects_missing_content() {
        let err = parse_response(&serde_json::json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidResponse(_)));
    }

    #[test]
    fn rejects_empty_scenes() {
        let err = parse_response(&response(r#"{"title": "x", "scenes": []}"#)).unwrap_err();
        assert!(err.to_string().contains("no scenes"));
    }

    #[test]
    fn prompt_mentions_keywords() {
        let params = ScenarioParams {
            topic: "Docker".into(),
            duration_secs: 120,
            target_audience: AudienceLevel::Beginner,
            language: "ko".into(),
            style: "modern".into(),
            keywords: vec!["image".into(), "volume".into()],
            include_code_examples: true,
        };
        assert!(LlmScenarioService::user_prompt(&params).contains("image, volume"));
        let system = LlmScenarioService::system_prompt(&params);
        assert!(system.contains("ko language"));
        assert!(system.contains("about 100 seconds"));
    }
}
