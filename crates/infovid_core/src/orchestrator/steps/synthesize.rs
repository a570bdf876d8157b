//! Synthesize step - encodes the stills, timeline and subtitles into an MP4.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::VideoSettings;
use crate::media::{SynthesisInput, SynthesisOutput, VideoSynthesizer};
use crate::models::{VideoMetadata, VideoResult};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{StepContext, StepOutput};
use crate::workflow::StepKind;

pub struct SynthesizeVideoStep {
    synthesizer: VideoSynthesizer,
}

impl SynthesizeVideoStep {
    pub fn new(settings: VideoSettings) -> Self {
        Self {
            synthesizer: VideoSynthesizer::new(settings),
        }
    }

    /// Music track to mix in, if asked for and available.
    fn music(&self, ctx: &StepContext) -> Option<PathBuf> {
        if !ctx.data.request.options.background_music {
            return None;
        }
        let configured = self.synthesizer.settings().background_music.trim();
        if configured.is_empty() {
            tracing::warn!(
                "[{}] Background music requested but none is configured",
                ctx.workflow_id
            );
            return None;
        }
        let path = PathBuf::from(configured);
        if !path.exists() {
            tracing::warn!(
                "[{}] Background music {} not found, encoding without it",
                ctx.workflow_id,
                path.display()
            );
            return None;
        }
        Some(path)
    }

    fn input(&self, ctx: &StepContext) -> StepResult<SynthesisInput> {
        let script = ctx.require_script(self.kind())?;
        Ok(SynthesisInput {
            workflow_id: ctx.workflow_id.clone(),
            stills: ctx.data.infographics.iter().map(|a| a.path.clone()).collect(),
            section_durations: script.sections.iter().map(|s| s.duration_secs).collect(),
            intro_secs: script.intro_duration_secs,
            conclusion_secs: script.conclusion_duration_secs,
            subtitles: ctx.data.subtitles.as_ref().map(|s| s.path.clone()),
            music: self.music(ctx),
            output_dir: ctx.output_dir(),
            scratch_root: ctx.settings.paths.temp_dir(),
        })
    }

    /// Assemble the final result record from the encoded output.
    fn video_result(&self, ctx: &StepContext, out: SynthesisOutput) -> StepResult<VideoResult> {
        let script = ctx.require_script(self.kind())?;
        let request = &ctx.data.request;
        let file_size = match out.probe.size_bytes {
            Some(size) => size,
            None => std::fs::metadata(&out.video_path)
                .map(|m| m.len())
                .unwrap_or(0),
        };
        let now = Utc::now();
        let processing_time_ms = (now - ctx.data.started_at).num_milliseconds().max(0) as u64;

        Ok(VideoResult {
            video_id: ctx.workflow_id.clone(),
            project_id: request.project_id.clone(),
            user_id: request.user_id.clone(),
            path: out.video_path,
            thumbnail_path: out.thumbnail_path,
            duration_secs: out.duration_secs,
            file_size,
            format: "mp4".to_string(),
            resolution: self.synthesizer.settings().resolution(),
            subtitle_paths: ctx.data.subtitles.iter().map(|s| s.path.clone()).collect(),
            infographic_paths: ctx.data.infographics.iter().map(|a| a.path.clone()).collect(),
            metadata: VideoMetadata {
                title: script.title.clone(),
                description: script.description(),
                keywords: script.keywords.clone(),
                generated_at: now,
                processing_time_ms,
                cost_usd: ctx.data.cost_usd,
                probe: out.probe,
            },
        })
    }
}

#[async_trait]
impl PipelineStep for SynthesizeVideoStep {
    fn kind(&self) -> StepKind {
        StepKind::SynthesizeVideo
    }

    fn validate_input(&self, ctx: &StepContext) -> StepResult<()> {
        let script = ctx.require_script(self.kind())?;
        if ctx.data.infographics.len() != script.sections.len() {
            return Err(StepError::invalid_input(format!(
                "{} infographics for {} sections",
                ctx.data.infographics.len(),
                script.sections.len()
            )));
        }
        if ctx.data.subtitles.is_none() {
            return Err(StepError::invalid_input("synthesize-video requires subtitles"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutput> {
        let input = self.input(ctx)?;
        let out = self
            .synthesizer
            .synthesize(&input, |p| ctx.report_progress(p))
            .await?;
        let result = self.video_result(ctx, out)?;
        Ok(StepOutput::Video(Box::new(result)))
    }

    fn validate_output(&self, _ctx: &StepContext, output: &StepOutput) -> StepResult<()> {
        let StepOutput::Video(video) = output else {
            return Ok(());
        };
        if !video.path.exists() {
            return Err(StepError::invalid_output(format!(
                "{} was not written",
                video.path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Settings;
    use crate::models::{GenerationRequest, ImageFormat, InfographicAsset, MediaProbe};
    use crate::queue::ProgressReporter;
    use crate::script::ScriptGenerator;
    use crate::subtitles::SubtitleSegment;
    use crate::workflow::{PipelineData, SubtitleOutput};

    fn ctx(with_assets: bool) -> StepContext {
        let request = GenerationRequest::for_topic("Docker", 120);
        let script = ScriptGenerator::default().from_template(&request).unwrap();
        let mut data = PipelineData::new(request);
        if with_assets {
            data.infographics = (0..script.sections.len())
                .map(|i| InfographicAsset {
                    section_index: i,
                    path: PathBuf::from(format!("out/section_{:02}.png", i + 1)),
                    width: 1920,
                    height: 1080,
                    format: ImageFormat::Png,
                })
                .collect();
            data.subtitles = Some(SubtitleOutput {
                path: PathBuf::from("out/wf.srt"),
                segment_count: 1,
                last_end_ms: 119_900,
                segments: vec![SubtitleSegment::new(1, 118_000, 119_900, "Thanks")],
            });
        }
        data.script = Some(script);
        data.cost_usd = 0.02;
        StepContext {
            workflow_id: "wf".into(),
            step_index: 3,
            attempt: 1,
            data,
            settings: Arc::new(Settings::default()),
            progress: ProgressReporter::noop(),
        }
    }

    #[test]
    fn needs_every_earlier_output() {
        let step = SynthesizeVideoStep::new(VideoSettings::default());
        assert!(matches!(
            step.validate_input(&ctx(false)),
            Err(StepError::InvalidInput(_))
        ));
        step.validate_input(&ctx(true)).unwrap();
    }

    #[test]
    fn input_spans_intro_sections_and_conclusion() {
        let step = SynthesizeVideoStep::new(VideoSettings::default());
        let input = step.input(&ctx(true)).unwrap();
        assert_eq!(input.stills.len(), 4);
        let total: f64 = input.section_durations.iter().sum::<f64>()
            + input.intro_secs
            + input.conclusion_secs;
        assert!((total - 120.0).abs() < 1e-6);
        assert!(input.music.is_none());
    }

    #[test]
    fn result_carries_metadata() {
        let step = SynthesizeVideoStep::new(VideoSettings::default());
        let ctx = ctx(true);
        let result = step
            .video_result(
                &ctx,
                SynthesisOutput {
                    video_path: PathBuf::from("out/wf.mp4"),
                    thumbnail_path: PathBuf::from("out/wf_thumb.jpg"),
                    duration_secs: 120.0,
                    probe: MediaProbe {
                        size_bytes: Some(1234),
                        ..MediaProbe::default()
                    },
                },
            )
            .unwrap();

        assert_eq!(result.video_id, "wf");
        assert_eq!(result.file_size, 1234);
        assert_eq!(result.resolution, "1920x1080");
        assert_eq!(result.infographic_paths.len(), 4);
        assert_eq!(result.subtitle_paths, vec![PathBuf::from("out/wf.srt")]);
        assert_eq!(result.metadata.cost_usd, 0.02);
        assert_eq!(result.metadata.title, "Docker explained");
    }
}
