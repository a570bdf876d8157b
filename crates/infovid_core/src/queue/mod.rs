//! Job queue boundary.
//!
//! Steps run as jobs. The orchestrator enqueues one job at a time per
//! workflow and learns about progress through `QueueEvent`s. This module
//! provides:
//! - The `JobQueue` and `JobHandler` seams
//! - `LocalJobQueue`, an in-process tokio implementation with FIFO
//!   dispatch, a concurrency limit and retry with exponential backoff
//! - `ProgressReporter` handed to every job

mod job;
mod local;
mod progress;
mod retry;

pub use job::{JobId, JobRef, QueueEvent, StepJob};
pub use local::LocalJobQueue;
pub use progress::{ProgressCallback, ProgressReporter};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::orchestrator::{StepError, StepOutput};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue is closed")]
    Closed,
}

/// Counters describing the queue at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub delayed: usize,
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
}

/// Where step jobs are submitted.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: StepJob) -> Result<JobId, QueueError>;

    /// Drop every waiting or delayed job of a workflow. Running jobs are
    /// left alone. Returns how many jobs were removed.
    fn remove_workflow_jobs(&self, workflow_id: &str) -> usize;

    fn stats(&self) -> QueueStats;
}

/// Executes a dequeued job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn process(
        &self,
        job: &StepJob,
        progress: ProgressReporter,
    ) -> Result<StepOutput, StepError>;
}
