//! Step registry: maps step kinds to their implementations.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::errors::{StepError, StepResult};
use super::step::PipelineStep;
use super::types::{StepContext, StepOutput};
use crate::config::Settings;
use crate::queue::{JobHandler, ProgressReporter, StepJob};
use crate::workflow::StepKind;

/// Table of step implementations, used as the queue's job handler.
pub struct StepRegistry {
    settings: Arc<Settings>,
    steps: BTreeMap<StepKind, Arc<dyn PipelineStep>>,
}

impl StepRegistry {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            steps: BTreeMap::new(),
        }
    }

    /// Register a step, replacing any previous one of the same kind.
    pub fn register<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.insert(step.kind(), Arc::new(step));
        self
    }

    /// Register a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.register(step);
        self
    }

    pub fn with_shared_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.insert(step.kind(), step);
        self
    }

    pub fn get(&self, kind: StepKind) -> Option<&Arc<dyn PipelineStep>> {
        self.steps.get(&kind)
    }

    pub fn kinds(&self) -> Vec<StepKind> {
        self.steps.keys().copied().collect()
    }

    /// Run one step: validate input, execute, validate output.
    pub async fn run_step(&self, ctx: &StepContext, kind: StepKind) -> StepResult<StepOutput> {
        let step = self
            .get(kind)
            .ok_or_else(|| StepError::other(format!("no step registered for {}", kind)))?;
        let name = step.name();

        tracing::debug!("[{}] Validating input for '{}'", ctx.workflow_id, name);
        step.validate_input(ctx)?;

        tracing::info!(
            "[{}] Executing '{}' (attempt {})",
            ctx.workflow_id,
            name,
            ctx.attempt
        );
        let output = step.execute(ctx).await?;

        if output.kind() != kind {
            return Err(StepError::invalid_output(format!(
                "{} returned output for {}",
                kind,
                output.kind()
            )));
        }
        step.validate_output(ctx, &output)?;

        tracing::info!("[{}] '{}' completed", ctx.workflow_id, name);
        Ok(output)
    }
}

#[async_trait]
impl JobHandler for StepRegistry {
    async fn process(
        &self,
        job: &StepJob,
        progress: ProgressReporter,
    ) -> Result<StepOutput, StepError> {
        let ctx = StepContext {
            workflow_id: job.workflow_id.clone(),
            step_index: job.step_index,
            attempt: job.attempt,
            data: job.data.clone(),
            settings: Arc::clone(&self.settings),
            progress,
        };
        self.run_step(&ctx, job.kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationRequest, UploadDescriptor};
    use crate::workflow::PipelineData;

    struct Upload;

    #[async_trait]
    impl PipelineStep for Upload {
        fn kind(&self) -> StepKind {
            StepKind::UploadVideo
        }

        async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutput> {
            ctx.report_progress(100);
            Ok(StepOutput::Upload(UploadDescriptor {
                platform: "local".into(),
                remote_id: ctx.workflow_id.clone(),
                url: "file:///tmp".into(),
                uploaded_at: chrono::Utc::now(),
            }))
        }
    }

    struct NeedsScript;

    #[async_trait]
    impl PipelineStep for NeedsScript {
        fn kind(&self) -> StepKind {
            StepKind::GenerateSubtitles
        }

        fn validate_input(&self, ctx: &StepContext) -> StepResult<()> {
            ctx.require_script(self.kind()).map(|_| ())
        }

        async fn execute(&self, _ctx: &StepContext) -> StepResult<StepOutput> {
            Err(StepError::other("unreachable"))
        }
    }

    fn job(kind: StepKind) -> StepJob {
        StepJob::new(
            "wf-1",
            0,
            kind,
            PipelineData::new(GenerationRequest::for_topic("t", 120)),
        )
    }

    fn registry() -> StepRegistry {
        StepRegistry::new(Arc::new(Settings::default()))
            .with_step(Upload)
            .with_step(NeedsScript)
    }

    #[tokio::test]
    async fn dispatches_by_kind() {
        let out = registry()
            .process(&job(StepKind::UploadVideo), ProgressReporter::noop())
            .await
            .unwrap();
        assert!(matches!(out, StepOutput::Upload(ref u) if u.remote_id == "wf-1"));
    }

    #[tokio::test]
    async fn unknown_kind_fails() {
        let err = registry()
            .process(&job(StepKind::SynthesizeVideo), ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("synthesize-video"));
    }

    #[tokio::test]
    async fn input_validation_runs_first() {
        let err = registry()
            .process(&job(StepKind::GenerateSubtitles), ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidInput(_)));
    }

    #[test]
    fn kinds_are_ordered() {
        assert_eq!(
            registry().kinds(),
            vec![StepKind::GenerateSubtitles, StepKind::UploadVideo]
        );
    }
}
