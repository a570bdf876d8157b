//! In-process job queue on tokio.
//!
//! Jobs are dispatched in submission order by a single dispatcher task that
//! holds a semaphore permit per running job. Failed attempts are re-submitted
//! after an exponential backoff unless their workflow was removed meanwhile.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

use super::job::{JobId, QueueEvent, StepJob};
use super::progress::ProgressReporter;
use super::retry::RetryPolicy;
use super::{JobHandler, JobQueue, QueueError, QueueStats};
use crate::config::QueueSettings;
use crate::orchestrator::StepError;

/// A job known to the queue but not running.
#[derive(Debug)]
struct Parked {
    workflow_id: String,
    /// Waiting out a retry backoff rather than a free slot.
    delayed: bool,
}

struct Inner {
    handler: Arc<dyn JobHandler>,
    retry: RetryPolicy,
    permits: Arc<Semaphore>,
    submit: mpsc::UnboundedSender<StepJob>,
    events: mpsc::UnboundedSender<QueueEvent>,
    parked: Mutex<HashMap<JobId, Parked>>,
    /// Workflows whose jobs were removed. Their running attempts are not
    /// retried. Locked after `parked` when both are held.
    removed: Mutex<HashSet<String>>,
    active: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    closed: AtomicBool,
}

/// Tokio-backed `JobQueue`.
#[derive(Clone)]
pub struct LocalJobQueue {
    inner: Arc<Inner>,
}

impl LocalJobQueue {
    /// Create the queue and spawn its dispatcher.
    ///
    /// Must be called inside a Tokio runtime. The receiver yields lifecycle
    /// events for every job.
    pub fn new(
        handler: Arc<dyn JobHandler>,
        settings: &QueueSettings,
    ) -> (Self, mpsc::UnboundedReceiver<QueueEvent>) {
        Self::with_policy(
            handler,
            RetryPolicy::from_settings(settings),
            settings.concurrency,
        )
    }

    pub fn with_policy(
        handler: Arc<dyn JobHandler>,
        retry: RetryPolicy,
        concurrency: usize,
    ) -> (Self, mpsc::UnboundedReceiver<QueueEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            handler,
            retry,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            submit: submit_tx,
            events: events_tx,
            parked: Mutex::new(HashMap::new()),
            removed: Mutex::new(HashSet::new()),
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });

        tokio::spawn(dispatch(Arc::clone(&inner), submit_rx));

        (Self { inner }, events_rx)
    }

    /// Stop accepting jobs. Waiting jobs are never started; running jobs
    /// finish and report normally.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.permits.close();
        self.inner.parked.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl JobQueue for LocalJobQueue {
    fn enqueue(&self, job: StepJob) -> Result<JobId, QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        let job_id = job.job_id.clone();
        self.inner.parked.lock().insert(
            job_id.clone(),
            Parked {
                workflow_id: job.workflow_id.clone(),
                delayed: false,
            },
        );
        self.inner
            .submit
            .send(job)
            .map_err(|_| QueueError::Closed)?;

        tracing::debug!("Enqueued job {}", job_id);
        Ok(job_id)
    }

    fn remove_workflow_jobs(&self, workflow_id: &str) -> usize {
        let mut parked = self.inner.parked.lock();
        self.inner.removed.lock().insert(workflow_id.to_string());
        let before = parked.len();
        parked.retain(|_, p| p.workflow_id != workflow_id);
        let removed = before - parked.len();
        if removed > 0 {
            tracing::debug!("Removed {} queued job(s) of workflow {}", removed, workflow_id);
        }
        removed
    }

    fn stats(&self) -> QueueStats {
        let parked = self.inner.parked.lock();
        let delayed = parked.values().filter(|p| p.delayed).count();
        QueueStats {
            waiting: parked.len() - delayed,
            delayed,
            active: self.inner.active.load(Ordering::SeqCst),
            completed: self.inner.completed.load(Ordering::SeqCst),
            failed: self.inner.failed.load(Ordering::SeqCst),
        }
    }
}

/// Start jobs in submission order as permits become free.
async fn dispatch(inner: Arc<Inner>, mut submit: mpsc::UnboundedReceiver<StepJob>) {
    while let Some(job) = submit.recv().await {
        let Ok(permit) = Arc::clone(&inner.permits).acquire_owned().await else {
            break;
        };

        // Removed while waiting for a slot
        if inner.parked.lock().remove(&job.job_id).is_none() {
            tracing::debug!("Skipping removed job {}", job.job_id);
            continue;
        }

        inner.active.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(run_attempt(Arc::clone(&inner), job, permit));
    }
    tracing::debug!("Job dispatcher stopped");
}

async fn run_attempt(inner: Arc<Inner>, job: StepJob, permit: OwnedSemaphorePermit) {
    let job_ref = job.job_ref();
    let _ = inner.events.send(QueueEvent::Active(job_ref.clone()));

    let reporter = {
        let events = inner.events.clone();
        let job_ref = job_ref.clone();
        ProgressReporter::new(Arc::new(move |percent| {
            let _ = events.send(QueueEvent::Progress {
                job: job_ref.clone(),
                percent,
            });
        }))
    };

    // A panicking step is reported as a failure instead of stalling the workflow
    let handler = Arc::clone(&inner.handler);
    let attempt_job = job.clone();
    let result = tokio::spawn(async move { handler.process(&attempt_job, reporter).await })
        .await
        .unwrap_or_else(|e| Err(StepError::other(format!("step task aborted: {}", e))));

    inner.active.fetch_sub(1, Ordering::SeqCst);
    drop(permit);

    match result {
        Ok(output) => {
            inner.completed.fetch_add(1, Ordering::SeqCst);
            let _ = inner.events.send(QueueEvent::Completed {
                job: job_ref,
                output,
            });
        }
        Err(error) => {
            let will_retry = error.is_retryable()
                && inner.retry.should_retry(job.attempt)
                && !inner.closed.load(Ordering::SeqCst)
                && !inner.is_removed(&job.workflow_id);

            tracing::warn!(
                "Job {} ({}) attempt {} failed: {}",
                job.job_id,
                job.kind,
                job.attempt,
                error
            );
            let _ = inner.events.send(QueueEvent::Failed {
                job: job_ref,
                error: error.to_string(),
                will_retry,
            });

            if !(will_retry && schedule_retry(&inner, job)) {
                inner.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

impl Inner {
    fn is_removed(&self, workflow_id: &str) -> bool {
        self.removed.lock().contains(workflow_id)
    }
}

/// Park the job for its next attempt. Returns false when its workflow was
/// removed in the meantime.
fn schedule_retry(inner: &Arc<Inner>, mut job: StepJob) -> bool {
    let delay = inner.retry.delay_for_attempt(job.attempt);
    {
        let mut parked = inner.parked.lock();
        if inner.is_removed(&job.workflow_id) {
            tracing::debug!("Retry of job {} dropped, workflow removed", job.job_id);
            return false;
        }
        parked.insert(
            job.job_id.clone(),
            Parked {
                workflow_id: job.workflow_id.clone(),
                delayed: true,
            },
        );
    }

    let inner = Arc::clone(inner);

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let mut parked = inner.parked.lock();
        match parked.get_mut(&job.job_id) {
            Some(entry) => entry.delayed = false,
            None => {
                tracing::debug!("Retry of removed job {} dropped", job.job_id);
                return;
            }
        }
        drop(parked);

        job.attempt += 1;
        if inner.submit.send(job).is_err() {
            tracing::warn!("Queue closed before retry could be submitted");
        }
    });
    true
}
