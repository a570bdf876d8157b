//! Workflow, step and status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    GenerationRequest, InfographicAsset, Scenario, Script, UploadDescriptor, VideoResult,
};
use crate::subtitles::SubtitleSegment;

/// Workflow identifier (UUID v4 string).
pub type WorkflowId = String;

/// The kinds of work a workflow can contain, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    GenerateScript,
    CreateInfographics,
    GenerateSubtitles,
    SynthesizeVideo,
    UploadVideo,
}

impl StepKind {
    /// Queue job name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::GenerateScript => "generate-script",
            StepKind::CreateInfographics => "create-infographics",
            StepKind::GenerateSubtitles => "generate-subtitles",
            StepKind::SynthesizeVideo => "synthesize-video",
            StepKind::UploadVideo => "upload-video",
        }
    }

    /// Human-readable step name.
    pub fn display_name(&self) -> &'static str {
        match self {
            StepKind::GenerateScript => "Generate script",
            StepKind::CreateInfographics => "Create infographics",
            StepKind::GenerateSubtitles => "Generate subtitles",
            StepKind::SynthesizeVideo => "Synthesize video",
            StepKind::UploadVideo => "Upload video",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Cancelled
        )
    }

    /// Whether `self -> to` is a legal move.
    ///
    /// `pending -> processing -> completed | failed | cancelled`; a pending
    /// step may also be cancelled directly.
    pub fn can_transition_to(&self, to: StepStatus) -> bool {
        matches!(
            (self, to),
            (StepStatus::Pending, StepStatus::Processing)
                | (StepStatus::Pending, StepStatus::Cancelled)
                | (StepStatus::Processing, StepStatus::Completed)
                | (StepStatus::Processing, StepStatus::Failed)
                | (StepStatus::Processing, StepStatus::Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Processing => "processing",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Cancelled => "cancelled",
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("step '{step}' cannot move from {from} to {to}")]
pub struct TransitionError {
    pub step: String,
    pub from: &'static str,
    pub to: &'static str,
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    pub kind: StepKind,
    pub status: StepStatus,
    /// 0-100, non-decreasing while processing.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
}

impl WorkflowStep {
    pub fn new(kind: StepKind) -> Self {
        Self {
            id: kind.as_str().to_string(),
            name: kind.display_name().to_string(),
            kind,
            status: StepStatus::Pending,
            progress: 0,
            started_at: None,
            finished_at: None,
            error: None,
            output: None,
        }
    }

    /// Move to `to`, stamping start/finish times.
    pub fn transition(&mut self, to: StepStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                step: self.id.clone(),
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }

        let now = Utc::now();
        match to {
            StepStatus::Processing => self.started_at = Some(now),
            StepStatus::Completed => {
                self.progress = 100;
                self.finished_at = Some(now);
            }
            _ => self.finished_at = Some(now),
        }
        self.status = to;
        Ok(())
    }

    /// Record progress. Ignored unless processing or when it would go back.
    ///
    /// Returns true if the stored value changed.
    pub fn set_progress(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if self.status != StepStatus::Processing || percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }
}

/// Aggregate status of a workflow, derived from its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    /// Failed beats everything, then all-completed, then cancelled, then
    /// processing; otherwise pending.
    pub fn aggregate(steps: &[WorkflowStep]) -> Self {
        if steps.iter().any(|s| s.status == StepStatus::Failed) {
            WorkflowStatus::Failed
        } else if !steps.is_empty() && steps.iter().all(|s| s.status == StepStatus::Completed) {
            WorkflowStatus::Completed
        } else if steps.iter().any(|s| s.status == StepStatus::Cancelled) {
            WorkflowStatus::Cancelled
        } else if steps.iter().any(|s| s.status == StepStatus::Processing) {
            WorkflowStatus::Processing
        } else {
            WorkflowStatus::Pending
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Processing => "processing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subtitle step result: the written SRT file and its captions in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleOutput {
    pub path: std::path::PathBuf,
    pub segment_count: usize,
    pub last_end_ms: u64,
    #[serde(default)]
    pub segments: Vec<SubtitleSegment>,
}

/// Data accumulated across steps.
///
/// Each step reads what earlier steps left here and adds its own section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineData {
    pub request: GenerationRequest,
    pub started_at: DateTime<Utc>,
    /// Scenario resolved when the workflow started, if one was referenced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub infographics: Vec<InfographicAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<SubtitleOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadDescriptor>,
    /// Estimated spend on external services so far.
    #[serde(default)]
    pub cost_usd: f64,
}

impl PipelineData {
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            request,
            started_at: Utc::now(),
            scenario: None,
            script: None,
            infographics: Vec::new(),
            subtitles: None,
            video: None,
            upload: None,
            cost_usd: 0.0,
        }
    }
}

/// A video generation workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub steps: Vec<WorkflowStep>,
    pub data: PipelineData,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn new(id: impl Into<WorkflowId>, request: GenerationRequest, plan: &[StepKind]) -> Self {
        Self {
            id: id.into(),
            steps: plan.iter().copied().map(WorkflowStep::new).collect(),
            data: PipelineData::new(request),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.data.request
    }

    pub fn status(&self) -> WorkflowStatus {
        WorkflowStatus::aggregate(&self.steps)
    }

    /// Mean step progress, 0-100.
    pub fn progress(&self) -> u8 {
        if self.steps.is_empty() {
            return 0;
        }
        let sum: u32 = self.steps.iter().map(|s| s.progress as u32).sum();
        (sum / self.steps.len() as u32) as u8
    }

    pub fn step(&self, index: usize) -> Option<&WorkflowStep> {
        self.steps.get(index)
    }

    pub fn step_mut(&mut self, index: usize) -> Option<&mut WorkflowStep> {
        self.steps.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Vec<StepKind> {
        vec![
            StepKind::GenerateScript,
            StepKind::CreateInfographics,
            StepKind::GenerateSubtitles,
            StepKind::SynthesizeVideo,
        ]
    }

    fn workflow() -> Workflow {
        Workflow::new("wf", GenerationRequest::for_topic("Docker", 120), &plan())
    }

    #[test]
    fn legal_transitions() {
        let mut step = WorkflowStep::new(StepKind::GenerateScript);
        step.transition(StepStatus::Processing).unwrap();
        assert!(step.started_at.is_some());
        step.transition(StepStatus::Completed).unwrap();
        assert_eq!(step.progress, 100);
        assert!(step.finished_at.is_some());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut step = WorkflowStep::new(StepKind::GenerateScript);
        assert!(step.transition(StepStatus::Completed).is_err());
        assert!(step.transition(StepStatus::Failed).is_err());

        step.transition(StepStatus::Processing).unwrap();
        step.transition(StepStatus::Failed).unwrap();
        let err = step.transition(StepStatus::Processing).unwrap_err();
        assert_eq!(err.from, "failed");
        assert_eq!(step.status, StepStatus::Failed);
    }

    #[test]
    fn progress_is_monotonic_while_processing() {
        let mut step = WorkflowStep::new(StepKind::SynthesizeVideo);
        assert!(!step.set_progress(30));
        assert_eq!(step.progress, 0);

        step.transition(StepStatus::Processing).unwrap();
        assert!(step.set_progress(50));
        assert!(!step.set_progress(20));
        assert_eq!(step.progress, 50);
        assert!(step.set_progress(250));
        assert_eq!(step.progress, 100);
    }

    #[test]
    fn aggregate_status_rules() {
        let mut wf = workflow();
        assert_eq!(wf.status(), WorkflowStatus::Pending);

        wf.steps[0].transition(StepStatus::Processing).unwrap();
        assert_eq!(wf.status(), WorkflowStatus::Processing);

        wf.steps[0].transition(StepStatus::Completed).unwrap();
        wf.steps[1].transition(StepStatus::Processing).unwrap();
        wf.steps[2].transition(StepStatus::Cancelled).unwrap();
        assert_eq!(wf.status(), WorkflowStatus::Cancelled);

        wf.steps[1].transition(StepStatus::Failed).unwrap();
        assert_eq!(wf.status(), WorkflowStatus::Failed);
    }

    #[test]
    fn all_completed_is_completed() {
        let mut wf = workflow();
        for step in &mut wf.steps {
            step.transition(StepStatus::Processing).unwrap();
            step.transition(StepStatus::Completed).unwrap();
        }
        assert_eq!(wf.status(), WorkflowStatus::Completed);
        assert_eq!(wf.progress(), 100);
    }

    #[test]
    fn progress_is_mean_of_steps() {
        let mut wf = workflow();
        wf.steps[0].transition(StepStatus::Processing).unwrap();
        wf.steps[0].transition(StepStatus::Completed).unwrap();
        wf.steps[1].transition(StepStatus::Processing).unwrap();
        wf.steps[1].set_progress(50);
        assert_eq!(wf.progress(), 37);
    }

    #[test]
    fn step_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&StepKind::CreateInfographics).unwrap();
        assert_eq!(json, "\"create-infographics\"");
        assert_eq!(StepKind::UploadVideo.to_string(), "upload-video");
    }
}
