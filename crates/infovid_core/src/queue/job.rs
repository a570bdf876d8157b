//! Job payload and lifecycle events.

use serde::{Deserialize, Serialize};

use crate::orchestrator::StepOutput;
use crate::workflow::{PipelineData, StepKind, WorkflowId};

pub type JobId = String;

/// One step of one workflow, as submitted to the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepJob {
    pub job_id: JobId,
    pub workflow_id: WorkflowId,
    pub step_index: usize,
    pub kind: StepKind,
    /// Snapshot of the accumulated pipeline data at enqueue time.
    pub data: PipelineData,
    /// Attempt number, starting at 1.
    pub attempt: u32,
}

impl StepJob {
    pub fn new(
        workflow_id: impl Into<WorkflowId>,
        step_index: usize,
        kind: StepKind,
        data: PipelineData,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            step_index,
            kind,
            data,
            attempt: 1,
        }
    }

    pub fn job_ref(&self) -> JobRef {
        JobRef {
            job_id: self.job_id.clone(),
            workflow_id: self.workflow_id.clone(),
            step_index: self.step_index,
            kind: self.kind,
            attempt: self.attempt,
        }
    }
}

/// Identifies a job in events without carrying its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub job_id: JobId,
    pub workflow_id: WorkflowId,
    pub step_index: usize,
    pub kind: StepKind,
    pub attempt: u32,
}

/// Lifecycle events emitted by a queue.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A job attempt started executing.
    Active(JobRef),
    Progress { job: JobRef, percent: u8 },
    Completed { job: JobRef, output: StepOutput },
    /// An attempt failed. `will_retry` is false for the final failure.
    Failed {
        job: JobRef,
        error: String,
        will_retry: bool,
    },
}

impl QueueEvent {
    pub fn job(&self) -> &JobRef {
        match self {
            QueueEvent::Active(job)
            | QueueEvent::Progress { job, .. }
            | QueueEvent::Completed { job, .. }
            | QueueEvent::Failed { job, .. } => job,
        }
    }
}
