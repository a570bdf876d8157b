//! Scenario collaborator seam.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::ScenarioError;
use crate::models::{Scenario, ScenarioParams};

/// A freshly written scenario and what it cost to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedScenario {
    pub scenario: Scenario,
    pub cost_usd: f64,
}

/// Looks up stored scenarios and writes new ones.
#[async_trait]
pub trait ScenarioService: Send + Sync {
    /// Fetch a stored scenario. `Ok(None)` when the id is unknown.
    async fn get_scenario(&self, id: &str) -> Result<Option<Scenario>, ScenarioError>;

    /// Write a new scenario for a topic.
    async fn generate_scenario(
        &self,
        params: &ScenarioParams,
    ) -> Result<GeneratedScenario, ScenarioError>;
}

/// Scenarios kept in memory. Cannot generate new ones.
#[derive(Debug, Default)]
pub struct StaticScenarioService {
    scenarios: RwLock<HashMap<String, Scenario>>,
}

impl StaticScenarioService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenario(self, scenario: Scenario) -> Self {
        self.insert(scenario);
        self
    }

    pub fn insert(&self, scenario: Scenario) {
        self.scenarios.write().insert(scenario.id.clone(), scenario);
    }
}

#[async_trait]
impl ScenarioService for StaticScenarioService {
    async fn get_scenario(&self, id: &str) -> Result<Option<Scenario>, ScenarioError> {
        Ok(self.scenarios.read().get(id).cloned())
    }

    async fn generate_scenario(
        &self,
        _params: &ScenarioParams,
    ) -> Result<GeneratedScenario, ScenarioError> {
        Err(ScenarioError::Unavailable(
            "scenario generation is not configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudienceLevel, Scene, VisualType};

    fn scenario() -> Scenario {
        Scenario {
            id: "sc-1".into(),
            title: "Docker".into(),
            description: None,
            introduction: None,
            conclusion: None,
            scenes: vec![Scene {
                title: "Images".into(),
                content: "Layers".into(),
                duration_secs: 30.0,
                visual_type: VisualType::Diagram,
                visual_prompt: String::new(),
                code_example: None,
            }],
        }
    }

    #[tokio::test]
    async fn looks_up_by_id() {
        let service = StaticScenarioService::new().with_scenario(scenario());
        assert!(service.get_scenario("sc-1").await.unwrap().is_some());
        assert!(service.get_scenario("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn generation_is_unavailable() {
        let params = ScenarioParams {
            topic: "Docker".into(),
            duration_secs: 120,
            target_audience: AudienceLevel::Beginner,
            language: "en".into(),
            style: "modern".into(),
            keywords: Vec::new(),
            include_code_examples: false,
        };
        let err = StaticScenarioService::new()
            .generate_scenario(&params)
            .await
            .unwrap_err();
        assert!(matches!(err, ScenarioError::Unavailable(_)));
    }
}
