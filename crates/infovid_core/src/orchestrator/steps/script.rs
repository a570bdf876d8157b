//! Script step - turns the request (and a scenario, if any) into a script.
//!
//! Scenario sources, in order:
//! - the scenario resolved when the workflow was started
//! - a scenario generated by the scenario service from the topic
//! - none, in which case the built-in template is used

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ScriptSettings;
use crate::models::{GenerationRequest, Scenario, ScenarioParams};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{StepContext, StepOutput};
use crate::script::{ScenarioService, ScriptGenerator};
use crate::workflow::StepKind;

pub struct GenerateScriptStep {
    generator: ScriptGenerator,
    tolerance_secs: f64,
    scenarios: Option<Arc<dyn ScenarioService>>,
}

impl GenerateScriptStep {
    pub fn new(settings: ScriptSettings) -> Self {
        Self {
            tolerance_secs: settings.duration_tolerance_secs,
            generator: ScriptGenerator::new(settings),
            scenarios: None,
        }
    }

    pub fn with_scenario_service(mut self, service: Arc<dyn ScenarioService>) -> Self {
        self.scenarios = Some(service);
        self
    }

    /// Scenario to build from, plus what it cost to obtain.
    async fn resolve_scenario(
        &self,
        ctx: &StepContext,
    ) -> StepResult<(Option<Scenario>, f64)> {
        if let Some(scenario) = &ctx.data.scenario {
            return Ok((Some(scenario.clone()), 0.0));
        }

        let request = &ctx.data.request;
        let (Some(service), true, Some(topic)) = (
            self.scenarios.as_ref(),
            request.options.generate_scenario,
            request.topic(),
        ) else {
            return Ok((None, 0.0));
        };

        tracing::info!("[{}] Generating scenario for '{}'", ctx.workflow_id, topic);
        let generated = service
            .generate_scenario(&scenario_params(request, topic))
            .await?;
        Ok((Some(generated.scenario), generated.cost_usd))
    }
}

fn scenario_params(request: &GenerationRequest, topic: &str) -> ScenarioParams {
    ScenarioParams {
        topic: topic.to_string(),
        duration_secs: request.duration_secs,
        target_audience: request.target_audience,
        language: request.language.clone(),
        style: request.style.clone(),
        keywords: request.keywords.clone(),
        include_code_examples: request.options.include_code_examples,
    }
}

#[async_trait]
impl PipelineStep for GenerateScriptStep {
    fn kind(&self) -> StepKind {
        StepKind::GenerateScript
    }

    fn validate_input(&self, ctx: &StepContext) -> StepResult<()> {
        if ctx.data.request.duration_secs == 0 {
            return Err(StepError::invalid_input("requested duration is zero"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutput> {
        ctx.report_progress(10);

        let (scenario, cost_usd) = self.resolve_scenario(ctx).await?;
        ctx.report_progress(50);

        let request = &ctx.data.request;
        let script = match &scenario {
            Some(scenario) => self.generator.from_scenario(request, scenario)?,
            None => self.generator.from_template(request)?,
        };
        tracing::info!(
            "[{}] Script '{}': {} sections, {:.1}s",
            ctx.workflow_id,
            script.title,
            script.sections.len(),
            script.total_duration_secs
        );

        ctx.report_progress(100);
        Ok(StepOutput::Script { script, cost_usd })
    }

    fn validate_output(&self, ctx: &StepContext, output: &StepOutput) -> StepResult<()> {
        let StepOutput::Script { script, .. } = output else {
            return Ok(());
        };
        if script.sections.is_empty() {
            return Err(StepError::invalid_output("script has no sections"));
        }
        let requested = ctx.data.request.duration_secs as f64;
        let drift = (script.total_duration_secs - requested).abs();
        // Half a second of slack for rounding in rescaled scenes
        if drift > self.tolerance_secs + 0.5 {
            return Err(StepError::invalid_output(format!(
                "script runs {:.1}s, requested {:.0}s",
                script.total_duration_secs, requested
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::{Scene, VisualType};
    use crate::queue::ProgressReporter;
    use crate::script::{GeneratedScenario, ScenarioError, StaticScenarioService};
    use crate::workflow::PipelineData;
    use parking_lot::Mutex;

    struct FakeLlm {
        fail: bool,
    }

    #[async_trait]
    impl ScenarioService for FakeLlm {
        async fn get_scenario(&self, _id: &str) -> Result<Option<Scenario>, ScenarioError> {
            Ok(None)
        }

        async fn generate_scenario(
            &self,
            params: &ScenarioParams,
        ) -> Result<GeneratedScenario, ScenarioError> {
            if self.fail {
                return Err(ScenarioError::Unavailable("LLM unavailable".into()));
            }
            Ok(GeneratedScenario {
                scenario: Scenario {
                    id: "gen".into(),
                    title: params.topic.clone(),
                    description: None,
                    introduction: None,
                    conclusion: None,
                    scenes: vec![
                        scene("One", 50.0),
                        scene("Two", 50.0),
                    ],
                },
                cost_usd: 0.01,
            })
        }
    }

    fn scene(title: &str, secs: f64) -> Scene {
        Scene {
            title: title.into(),
            content: format!("{} content", title),
            duration_secs: secs,
            visual_type: VisualType::Diagram,
            visual_prompt: String::new(),
            code_example: None,
        }
    }

    fn ctx(request: GenerationRequest, seen: Arc<Mutex<Vec<u8>>>) -> StepContext {
        StepContext {
            workflow_id: "wf".into(),
            step_index: 0,
            attempt: 1,
            data: PipelineData::new(request),
            settings: Arc::new(Settings::default()),
            progress: ProgressReporter::new(Arc::new(move |p| seen.lock().push(p))),
        }
    }

    #[tokio::test]
    async fn template_without_service() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = ctx(GenerationRequest::for_topic("Docker", 120), Arc::clone(&seen));
        let step = GenerateScriptStep::new(ScriptSettings::default());

        let out = step.execute(&ctx).await.unwrap();
        step.validate_output(&ctx, &out).unwrap();
        match out {
            StepOutput::Script { script, cost_usd } => {
                assert_eq!(script.sections.len(), 4);
                assert_eq!(cost_usd, 0.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(*seen.lock(), vec![10, 50, 100]);
    }

    #[tokio::test]
    async fn generated_scenario_is_used_and_costed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = ctx(GenerationRequest::for_topic("Rust", 120), seen);
        let step = GenerateScriptStep::new(ScriptSettings::default())
            .with_scenario_service(Arc::new(FakeLlm { fail: false }));

        match step.execute(&ctx).await.unwrap() {
            StepOutput::Script { script, cost_usd } => {
                assert_eq!(script.sections[0].title, "One");
                assert_eq!(cost_usd, 0.01);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn service_failure_surfaces_its_message() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = ctx(GenerationRequest::for_topic("Rust", 120), seen);
        let step = GenerateScriptStep::new(ScriptSettings::default())
            .with_scenario_service(Arc::new(FakeLlm { fail: true }));

        let err = step.execute(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "LLM unavailable");
    }

    #[tokio::test]
    async fn generation_disabled_uses_template() {
        let mut request = GenerationRequest::for_topic("Rust", 120);
        request.options.generate_scenario = false;
        let ctx = ctx(request, Arc::new(Mutex::new(Vec::new())));
        let step = GenerateScriptStep::new(ScriptSettings::default())
            .with_scenario_service(Arc::new(StaticScenarioService::new()));

        match step.execute(&ctx).await.unwrap() {
            StepOutput::Script { script, .. } => assert_eq!(script.title, "Rust explained"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn too_short_for_template_is_invalid_input() {
        let ctx = ctx(
            GenerationRequest::for_topic("Rust", 60),
            Arc::new(Mutex::new(Vec::new())),
        );
        let err = GenerateScriptStep::new(ScriptSettings::default())
            .execute(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidInput(_)));
    }
}
