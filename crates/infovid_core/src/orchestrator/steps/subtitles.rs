//! Subtitles step - builds the SRT track for the script timeline.

use async_trait::async_trait;

use crate::config::SubtitleSettings;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{StepContext, StepOutput};
use crate::subtitles::SubtitleBuilder;
use crate::workflow::{StepKind, SubtitleOutput};

pub struct GenerateSubtitlesStep {
    builder: SubtitleBuilder,
}

impl GenerateSubtitlesStep {
    pub fn new(settings: SubtitleSettings) -> Self {
        Self {
            builder: SubtitleBuilder::new(settings),
        }
    }
}

#[async_trait]
impl PipelineStep for GenerateSubtitlesStep {
    fn kind(&self) -> StepKind {
        StepKind::GenerateSubtitles
    }

    fn validate_input(&self, ctx: &StepContext) -> StepResult<()> {
        ctx.require_script(self.kind()).map(|_| ())
    }

    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutput> {
        let script = ctx.require_script(self.kind())?;

        let track = self.builder.build(script)?;
        ctx.report_progress(50);
        track.validate(self.builder.settings())?;

        let out_dir = ctx.output_dir();
        std::fs::create_dir_all(&out_dir)
            .map_err(|e| StepError::io_error("creating output directory", e))?;
        let path = out_dir.join(format!("{}.srt", ctx.workflow_id));
        track.write_srt_file(&path)?;

        tracing::info!(
            "[{}] Wrote {} subtitle segments to {}",
            ctx.workflow_id,
            track.len(),
            path.display()
        );
        ctx.report_progress(100);

        Ok(StepOutput::Subtitles(SubtitleOutput {
            path,
            segment_count: track.len(),
            last_end_ms: track.last_end_ms(),
            segments: track.segments,
        }))
    }

    fn validate_output(&self, ctx: &StepContext, output: &StepOutput) -> StepResult<()> {
        let StepOutput::Subtitles(out) = output else {
            return Ok(());
        };
        if out.segments.len() != out.segment_count
            || out.segments.last().map_or(0, |s| s.end_ms) != out.last_end_ms
        {
            return Err(StepError::invalid_output(
                "subtitle segments do not match the written track",
            ));
        }
        let script = ctx.require_script(self.kind())?;
        let limit_ms = (script.total_duration_secs * 1000.0).round() as u64;
        if out.last_end_ms > limit_ms {
            return Err(StepError::invalid_output(format!(
                "subtitles end at {}ms, past the {}ms script",
                out.last_end_ms, limit_ms
            )));
        }
        Ok(())
    }
}
