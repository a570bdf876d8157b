//! Upload step - publishes the encoded video.

use std::sync::Arc;

use async_trait::async_trait;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{StepContext, StepOutput};
use crate::upload::Uploader;
use crate::workflow::StepKind;

pub struct UploadVideoStep {
    uploader: Arc<dyn Uploader>,
}

impl UploadVideoStep {
    pub fn new(uploader: Arc<dyn Uploader>) -> Self {
        Self { uploader }
    }
}

#[async_trait]
impl PipelineStep for UploadVideoStep {
    fn kind(&self) -> StepKind {
        StepKind::UploadVideo
    }

    fn validate_input(&self, ctx: &StepContext) -> StepResult<()> {
        if ctx.data.video.is_none() {
            return Err(StepError::invalid_input("upload-video requires an encoded video"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutput> {
        let video = ctx
            .data
            .video
            .as_ref()
            .ok_or_else(|| StepError::invalid_input("upload-video requires an encoded video"))?;

        ctx.report_progress(10);
        tracing::info!(
            "[{}] Uploading {} to {}",
            ctx.workflow_id,
            video.path.display(),
            self.uploader.platform()
        );
        let descriptor = self.uploader.upload(video).await?;
        ctx.report_progress(100);

        Ok(StepOutput::Upload(descriptor))
    }
}
