//! Step context and output types.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::models::{InfographicAsset, Script, UploadDescriptor, VideoResult};
use crate::queue::ProgressReporter;
use crate::workflow::{PipelineData, StepKind, SubtitleOutput, WorkflowId};

/// What a step hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepOutput {
    Script {
        script: Script,
        /// Spend on the scenario service for this step.
        #[serde(default)]
        cost_usd: f64,
    },
    Infographics {
        assets: Vec<InfographicAsset>,
    },
    Subtitles(SubtitleOutput),
    Video(Box<VideoResult>),
    Upload(UploadDescriptor),
}

impl StepOutput {
    /// Step kind this output belongs to.
    pub fn kind(&self) -> StepKind {
        match self {
            StepOutput::Script { .. } => StepKind::GenerateScript,
            StepOutput::Infographics { .. } => StepKind::CreateInfographics,
            StepOutput::Subtitles(_) => StepKind::GenerateSubtitles,
            StepOutput::Video(_) => StepKind::SynthesizeVideo,
            StepOutput::Upload(_) => StepKind::UploadVideo,
        }
    }

    /// Compact JSON stored on the workflow step.
    pub fn summary(&self) -> serde_json::Value {
        match self {
            StepOutput::Script { script, cost_usd } => serde_json::json!({
                "title": script.title,
                "sections": script.sections.len(),
                "total_duration_secs": script.total_duration_secs,
                "cost_usd": cost_usd,
            }),
            StepOutput::Infographics { assets } => serde_json::json!({
                "count": assets.len(),
                "paths": assets.iter().map(|a| a.path.clone()).collect::<Vec<PathBuf>>(),
            }),
            StepOutput::Subtitles(out) => serde_json::json!({
                "path": out.path,
                "segments": out.segment_count,
            }),
            StepOutput::Video(video) => serde_json::json!({
                "path": video.path,
                "thumbnail_path": video.thumbnail_path,
                "duration_secs": video.duration_secs,
                "file_size": video.file_size,
            }),
            StepOutput::Upload(upload) => serde_json::json!({
                "platform": upload.platform,
                "url": upload.url,
            }),
        }
    }
}

impl PipelineData {
    /// Fold a step's output into the accumulated data.
    pub fn merge(&mut self, output: StepOutput) {
        match output {
            StepOutput::Script { script, cost_usd } => {
                self.cost_usd += cost_usd;
                self.script = Some(script);
            }
            StepOutput::Infographics { assets } => self.infographics = assets,
            StepOutput::Subtitles(out) => self.subtitles = Some(out),
            StepOutput::Video(video) => self.video = Some(*video),
            StepOutput::Upload(upload) => self.upload = Some(upload),
        }
    }
}

/// Read-only context passed to a step execution.
pub struct StepContext {
    pub workflow_id: WorkflowId,
    pub step_index: usize,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// Data accumulated by earlier steps.
    pub data: PipelineData,
    pub settings: Arc<Settings>,
    pub progress: ProgressReporter,
}

impl StepContext {
    /// Report progress (0-100).
    pub fn report_progress(&self, percent: u8) {
        self.progress.report(percent);
    }

    /// The script, or an input error naming the step that needs it.
    pub fn require_script(&self, step: StepKind) -> Result<&Script, super::StepError> {
        self.data.script.as_ref().ok_or_else(|| {
            super::StepError::invalid_input(format!("{} requires a script", step.as_str()))
        })
    }

    pub fn output_dir(&self) -> PathBuf {
        self.settings.paths.output_dir()
    }

    /// Per-workflow scratch directory under the temp root.
    pub fn work_dir(&self) -> PathBuf {
        self.settings.paths.temp_dir().join(&self.workflow_id)
    }
}
