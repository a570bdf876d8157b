//! Infographics step - renders one card per script section.
//!
//! Sections render concurrently on the blocking pool. Assets come back in
//! section order; a single failed section fails the step.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::models::InfographicAsset;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{StepContext, StepOutput};
use crate::render::{CardRenderer, CardSpec, RenderError};
use crate::workflow::StepKind;

#[derive(Debug, Default)]
pub struct CreateInfographicsStep;

impl CreateInfographicsStep {
    pub fn new() -> Self {
        Self
    }

    fn asset_dir(ctx: &StepContext) -> PathBuf {
        ctx.output_dir().join(&ctx.workflow_id).join("infographics")
    }
}

#[async_trait]
impl PipelineStep for CreateInfographicsStep {
    fn kind(&self) -> StepKind {
        StepKind::CreateInfographics
    }

    fn validate_input(&self, ctx: &StepContext) -> StepResult<()> {
        let script = ctx.require_script(self.kind())?;
        if script.sections.is_empty() {
            return Err(StepError::invalid_input("script has no sections to render"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutput> {
        let script = ctx.require_script(self.kind())?;
        let video = &ctx.settings.video;
        let renderer = CardRenderer::new(video.width, video.height, &ctx.data.request.style);
        let out_dir = Self::asset_dir(ctx);
        let total = script.sections.len();

        let mut tasks: JoinSet<(usize, Result<InfographicAsset, RenderError>)> = JoinSet::new();
        for (index, section) in script.sections.iter().enumerate() {
            let card = CardSpec::from_section(index, total, section);
            let renderer = renderer.clone();
            let out_dir = out_dir.clone();
            tasks.spawn_blocking(move || (index, renderer.render(&card, &out_dir)));
        }

        let mut slots: Vec<Option<InfographicAsset>> = vec![None; total];
        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            let (index, result) =
                joined.map_err(|e| StepError::other(format!("render task failed: {}", e)))?;
            let asset = result.map_err(|e| {
                StepError::Render(format!("section {}: {}", index + 1, e))
            })?;
            slots[index] = Some(asset);
            done += 1;
            ctx.progress.report_fraction(done, total);
        }

        let assets: Vec<InfographicAsset> = slots.into_iter().flatten().collect();
        tracing::info!(
            "[{}] Rendered {} infographics into {}",
            ctx.workflow_id,
            assets.len(),
            out_dir.display()
        );
        Ok(StepOutput::Infographics { assets })
    }

    fn validate_output(&self, ctx: &StepContext, output: &StepOutput) -> StepResult<()> {
        let StepOutput::Infographics { assets } = output else {
            return Ok(());
        };
        let expected = ctx.require_script(self.kind())?.sections.len();
        if assets.len() != expected {
            return Err(StepError::invalid_output(format!(
                "rendered {} of {} sections",
                assets.len(),
                expected
            )));
        }
        if let Some(missing) = assets.iter().find(|a| !a.path.exists()) {
            return Err(StepError::invalid_output(format!(
                "{} was not written",
                missing.path.display()
            )));
        }
        Ok(())
    }
}
