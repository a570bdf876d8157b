//! Step plan for a request.

use crate::models::GenerationRequest;
use crate::workflow::StepKind;

/// Ordered list of steps a workflow walks through.
///
/// Steps never decide what comes next; the orchestrator asks the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    steps: Vec<StepKind>,
}

impl StepPlan {
    /// Script, infographics, subtitles, synthesis; upload when requested.
    pub fn for_request(request: &GenerationRequest) -> Self {
        let mut steps = vec![
            StepKind::GenerateScript,
            StepKind::CreateInfographics,
            StepKind::GenerateSubtitles,
            StepKind::SynthesizeVideo,
        ];
        if request.options.auto_upload {
            steps.push(StepKind::UploadVideo);
        }
        Self { steps }
    }

    pub fn from_steps(steps: Vec<StepKind>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[StepKind] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<StepKind> {
        self.steps.get(index).copied()
    }

    /// Index and kind of the step after `index`, if any.
    pub fn next(&self, index: usize) -> Option<(usize, StepKind)> {
        self.get(index + 1).map(|kind| (index + 1, kind))
    }
}
