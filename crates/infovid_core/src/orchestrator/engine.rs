//! Video orchestrator: workflow state machine driven by queue events.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::errors::{OrchestratorError, OrchestratorResult};
use super::plan::StepPlan;
use crate::config::Settings;
use crate::logging::{LogConfig, WorkflowLogger};
use crate::models::{GenerationRequest, Scenario};
use crate::queue::{JobQueue, JobRef, QueueEvent, QueueStats, StepJob};
use crate::script::ScenarioService;
use crate::workflow::{
    workflow_room, InMemoryWorkflowStore, StepStatus, UpdateTransport, Workflow, WorkflowEvent,
    WorkflowId, WorkflowStep, WorkflowStore, WorkflowUpdate,
};

/// Capacity of the local event bus. Slow subscribers lag rather than block.
const EVENT_BUS_CAPACITY: usize = 256;

struct Inner {
    settings: Arc<Settings>,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn WorkflowStore>,
    scenarios: Option<Arc<dyn ScenarioService>>,
    transport: RwLock<Option<Arc<dyn UpdateTransport>>>,
    events: broadcast::Sender<WorkflowEvent>,
    /// Held for every read-modify-write of a workflow record.
    write_lock: Mutex<()>,
    loggers: Mutex<HashMap<WorkflowId, Arc<WorkflowLogger>>>,
}

/// What happens after an applied event has been stored.
enum Followup {
    Continue,
    Enqueue(StepJob),
    Finished(WorkflowEvent),
}

/// Builder for [`VideoOrchestrator`].
pub struct OrchestratorBuilder {
    settings: Arc<Settings>,
    queue: Arc<dyn JobQueue>,
    store: Option<Arc<dyn WorkflowStore>>,
    scenarios: Option<Arc<dyn ScenarioService>>,
    transport: Option<Arc<dyn UpdateTransport>>,
}

impl OrchestratorBuilder {
    /// Workflow storage. Defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Collaborator used to resolve `scenario_id`s.
    pub fn scenario_service(mut self, service: Arc<dyn ScenarioService>) -> Self {
        self.scenarios = Some(service);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn UpdateTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> VideoOrchestrator {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        VideoOrchestrator {
            inner: Arc::new(Inner {
                settings: self.settings,
                queue: self.queue,
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(InMemoryWorkflowStore::new())),
                scenarios: self.scenarios,
                transport: RwLock::new(self.transport),
                events,
                write_lock: Mutex::new(()),
                loggers: Mutex::new(HashMap::new()),
            }),
        }
    }
}

/// Entry point for starting, watching and cancelling video workflows.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct VideoOrchestrator {
    inner: Arc<Inner>,
}

impl VideoOrchestrator {
    pub fn builder(settings: Arc<Settings>, queue: Arc<dyn JobQueue>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            settings,
            queue,
            store: None,
            scenarios: None,
            transport: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Validate the request, persist a workflow with every step pending and
    /// enqueue the first step. Returns without waiting for any step.
    pub async fn start_video_generation(
        &self,
        request: GenerationRequest,
    ) -> OrchestratorResult<WorkflowId> {
        validate_request(&request)?;
        let scenario = self.resolve_scenario(&request).await?;

        let id: WorkflowId = uuid::Uuid::new_v4().to_string();
        let plan = StepPlan::for_request(&request);
        let mut workflow = Workflow::new(id.clone(), request, plan.steps());
        workflow.data.scenario = scenario;

        let logger = self.logger_for(&id);
        if let Some(logger) = &logger {
            logger.phase("Workflow started");
            logger.info(&format!(
                "Steps: {}",
                plan.steps()
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            ));
        }

        let _guard = self.inner.write_lock.lock();
        self.inner.store.put(workflow.clone())?;

        let Some(first) = plan.get(0) else {
            return Err(OrchestratorError::validation("request produced an empty plan"));
        };
        let job = StepJob::new(id.clone(), 0, first, workflow.data.clone());
        if let Err(e) = self.inner.queue.enqueue(job) {
            if let Err(store_err) = self.inner.store.delete(&id) {
                tracing::warn!("[{}] Failed to roll back workflow: {}", id, store_err);
            }
            self.drop_logger(&id);
            return Err(e.into());
        }

        tracing::info!(
            "[{}] Started workflow for project '{}' ({} steps)",
            id,
            workflow.request().project_id,
            plan.len()
        );
        self.emit_workflow_update(&workflow);
        Ok(id)
    }

    async fn resolve_scenario(
        &self,
        request: &GenerationRequest,
    ) -> OrchestratorResult<Option<Scenario>> {
        let Some(scenario_id) = request.scenario_id.as_deref() else {
            return Ok(None);
        };
        let service = self.inner.scenarios.as_ref().ok_or_else(|| {
            OrchestratorError::validation(format!(
                "scenario '{}' given but no scenario service is configured",
                scenario_id
            ))
        })?;

        match service.get_scenario(scenario_id).await {
            Ok(Some(scenario)) => Ok(Some(scenario)),
            Ok(None) => Err(OrchestratorError::validation(format!(
                "unknown scenario '{}'",
                scenario_id
            ))),
            Err(e) => Err(OrchestratorError::Scenario(e.to_string())),
        }
    }

    /// Cancel a workflow.
    ///
    /// Waiting and delayed jobs are removed from the queue and every pending
    /// or processing step becomes cancelled. A step that is already running
    /// is not interrupted; whatever it reports later is discarded.
    ///
    /// Returns false for unknown ids and for workflows with nothing left to
    /// cancel.
    pub fn cancel_workflow(&self, workflow_id: &str) -> OrchestratorResult<bool> {
        let _guard = self.inner.write_lock.lock();
        let Some(mut workflow) = self.inner.store.get(workflow_id) else {
            return Ok(false);
        };

        let removed = self.inner.queue.remove_workflow_jobs(workflow_id);
        let mut cancelled = 0;
        for step in workflow.steps.iter_mut() {
            if matches!(step.status, StepStatus::Pending | StepStatus::Processing)
                && step.transition(StepStatus::Cancelled).is_ok()
            {
                cancelled += 1;
            }
        }
        if cancelled == 0 {
            return Ok(false);
        }

        workflow.finished_at = Some(Utc::now());
        self.inner.store.put(workflow.clone())?;

        tracing::info!(
            "[{}] Cancelled {} step(s), removed {} queued job(s)",
            workflow_id,
            cancelled,
            removed
        );
        if let Some(logger) = self.existing_logger(workflow_id) {
            logger.warn(&format!("Workflow cancelled ({} step(s))", cancelled));
        }

        self.emit_workflow_update(&workflow);
        self.emit(WorkflowEvent::Cancelled {
            workflow_id: workflow_id.to_string(),
        });
        self.drop_logger(workflow_id);
        Ok(true)
    }

    /// Current step list. Reading does not change anything.
    pub fn get_workflow_status(&self, workflow_id: &str) -> Option<Vec<WorkflowStep>> {
        self.inner.store.get(workflow_id).map(|w| w.steps)
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.inner.store.get(workflow_id)
    }

    /// Attach (or replace) the real-time transport.
    pub fn set_transport(&self, transport: Arc<dyn UpdateTransport>) {
        *self.inner.transport.write() = Some(transport);
    }

    /// Subscribe to the local event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.inner.events.subscribe()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.inner.queue.stats()
    }

    /// Consume queue lifecycle events until the queue's sender is gone.
    pub fn run(&self, mut events: mpsc::UnboundedReceiver<QueueEvent>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                this.handle_queue_event(event);
            }
            tracing::debug!("Queue event stream closed");
        })
    }

    /// Apply one queue lifecycle event to its workflow.
    pub fn handle_queue_event(&self, event: QueueEvent) {
        let job = event.job().clone();
        let _guard = self.inner.write_lock.lock();

        let Some(mut workflow) = self.inner.store.get(&job.workflow_id) else {
            tracing::warn!(
                "[{}] Event for unknown workflow (job {})",
                job.workflow_id,
                job.job_id
            );
            return;
        };
        let Some(status) = workflow.step(job.step_index).map(|s| s.status) else {
            tracing::warn!(
                "[{}] Event for missing step {}",
                job.workflow_id,
                job.step_index
            );
            return;
        };

        let accepted = match &event {
            QueueEvent::Active(_) => matches!(status, StepStatus::Pending | StepStatus::Processing),
            _ => status == StepStatus::Processing,
        };
        if !accepted {
            tracing::debug!(
                "[{}] Discarding late event for {} step {} ({})",
                job.workflow_id,
                status.as_str(),
                job.step_index,
                job.kind
            );
            if let Some(logger) = self.existing_logger(&job.workflow_id) {
                logger.debug(&format!(
                    "Discarded late event for {} ({})",
                    job.kind,
                    status.as_str()
                ));
            }
            return;
        }

        let logger = self.existing_logger(&job.workflow_id);
        let before = workflow.clone();
        let followup = match event {
            QueueEvent::Active(_) => {
                if !self.on_active(&mut workflow, &job, logger.as_deref()) {
                    return;
                }
                Followup::Continue
            }
            QueueEvent::Progress { percent, .. } => {
                let Some(step) = workflow.step_mut(job.step_index) else {
                    return;
                };
                if !step.set_progress(percent) {
                    return;
                }
                if let Some(logger) = &logger {
                    logger.progress(job.kind.as_str(), percent as u32);
                }
                Followup::Continue
            }
            QueueEvent::Completed { output, .. } => {
                self.on_completed(&mut workflow, &job, output, logger.as_deref())
            }
            QueueEvent::Failed {
                error, will_retry, ..
            } => {
                if will_retry {
                    tracing::warn!(
                        "[{}] {} attempt {} failed, retrying: {}",
                        job.workflow_id,
                        job.kind,
                        job.attempt,
                        error
                    );
                    if let Some(logger) = &logger {
                        logger.warn(&format!("Attempt {} failed: {}", job.attempt, error));
                    }
                    return;
                }
                match self.on_failed(&mut workflow, &job, error, logger.as_deref()) {
                    Some(event) => Followup::Finished(event),
                    None => Followup::Continue,
                }
            }
        };

        // Nothing is enqueued or published unless the store holds it
        if let Err(e) = self.inner.store.put(workflow.clone()) {
            self.fail_unpersisted(before, &job, &e.to_string(), logger.as_deref());
            return;
        }

        let terminal = match followup {
            Followup::Continue => None,
            Followup::Finished(event) => Some(event),
            Followup::Enqueue(next) => self.enqueue_next(&mut workflow, next),
        };

        self.emit_workflow_update(&workflow);
        if let Some(event) = terminal {
            self.emit(event);
            self.drop_logger(&job.workflow_id);
        }
    }

    /// Enqueue the step after a completed one. On failure the step is failed
    /// and the record stored again.
    fn enqueue_next(&self, workflow: &mut Workflow, next: StepJob) -> Option<WorkflowEvent> {
        let (index, kind) = (next.step_index, next.kind);
        let e = self.inner.queue.enqueue(next).err()?;

        let error = format!("Failed to enqueue step: {}", e);
        let step = workflow.step_mut(index)?;
        // Pending cannot fail directly
        let _ = step.transition(StepStatus::Processing);
        let _ = step.transition(StepStatus::Failed);
        step.error = Some(error.clone());
        workflow.finished_at = Some(Utc::now());
        tracing::error!("[{}] {}", workflow.id, error);
        if let Err(e) = self.inner.store.put(workflow.clone()) {
            tracing::error!("[{}] Failed to persist workflow: {}", workflow.id, e);
        }
        Some(WorkflowEvent::Failed {
            workflow_id: workflow.id.clone(),
            step: kind,
            error,
        })
    }

    /// The store rejected an update. The last stored record gets the event's
    /// step failed instead and the workflow ends.
    fn fail_unpersisted(
        &self,
        mut workflow: Workflow,
        job: &JobRef,
        reason: &str,
        logger: Option<&WorkflowLogger>,
    ) {
        let error = format!("Failed to persist workflow: {}", reason);
        tracing::error!("[{}] {}", job.workflow_id, error);
        if let Some(logger) = logger {
            logger.error(&error);
        }

        if let Some(step) = workflow.step_mut(job.step_index) {
            if step.status == StepStatus::Pending {
                let _ = step.transition(StepStatus::Processing);
            }
            if step.transition(StepStatus::Failed).is_ok() {
                step.error = Some(error.clone());
            }
        }
        workflow.finished_at = Some(Utc::now());

        match self.inner.store.put(workflow.clone()) {
            Ok(()) => self.emit_workflow_update(&workflow),
            Err(e) => tracing::error!(
                "[{}] Failed to record workflow failure: {}",
                job.workflow_id,
                e
            ),
        }
        self.emit(WorkflowEvent::Failed {
            workflow_id: job.workflow_id.clone(),
            step: job.kind,
            error,
        });
        self.drop_logger(&job.workflow_id);
    }

    /// Returns false when nothing changed.
    fn on_active(
        &self,
        workflow: &mut Workflow,
        job: &JobRef,
        logger: Option<&WorkflowLogger>,
    ) -> bool {
        let Some(step) = workflow.step_mut(job.step_index) else {
            return false;
        };
        if step.status == StepStatus::Processing {
            // Retry of a step that is already running
            if let Some(logger) = logger {
                logger.info(&format!("{}: attempt {}", step.name, job.attempt));
            }
            return false;
        }
        if let Err(e) = step.transition(StepStatus::Processing) {
            tracing::warn!("[{}] {}", job.workflow_id, e);
            return false;
        }
        tracing::info!("[{}] Step '{}' started", job.workflow_id, step.name);
        if let Some(logger) = logger {
            logger.phase(&step.name);
        }
        true
    }

    fn on_completed(
        &self,
        workflow: &mut Workflow,
        job: &JobRef,
        output: super::types::StepOutput,
        logger: Option<&WorkflowLogger>,
    ) -> Followup {
        let Some(step) = workflow.step_mut(job.step_index) else {
            return Followup::Continue;
        };
        step.output = Some(output.summary());
        if let Err(e) = step.transition(StepStatus::Completed) {
            tracing::warn!("[{}] {}", job.workflow_id, e);
            return Followup::Continue;
        }
        let name = step.name.clone();
        workflow.data.merge(output);

        tracing::info!("[{}] Step '{}' completed", job.workflow_id, name);
        if let Some(logger) = logger {
            logger.success(&format!("{} completed", name));
        }

        let plan = StepPlan::from_steps(workflow.steps.iter().map(|s| s.kind).collect());
        match plan.next(job.step_index) {
            Some((index, kind)) => Followup::Enqueue(StepJob::new(
                workflow.id.clone(),
                index,
                kind,
                workflow.data.clone(),
            )),
            None => {
                workflow.finished_at = Some(Utc::now());
                if let Some(logger) = logger {
                    logger.success("Workflow completed");
                }
                tracing::info!("[{}] Workflow completed", workflow.id);
                Followup::Finished(WorkflowEvent::Completed {
                    workflow_id: workflow.id.clone(),
                    result: workflow.data.video.clone().map(Box::new),
                })
            }
        }
    }

    fn on_failed(
        &self,
        workflow: &mut Workflow,
        job: &JobRef,
        error: String,
        logger: Option<&WorkflowLogger>,
    ) -> Option<WorkflowEvent> {
        let step = workflow.step_mut(job.step_index)?;
        if let Err(e) = step.transition(StepStatus::Failed) {
            tracing::warn!("[{}] {}", job.workflow_id, e);
            return None;
        }
        step.error = Some(error.clone());
        let name = step.name.clone();
        workflow.finished_at = Some(Utc::now());

        tracing::error!("[{}] Step '{}' failed: {}", job.workflow_id, name, error);
        if let Some(logger) = logger {
            logger.error(&format!("{} failed: {}", name, error));
            logger.show_tail("Last log lines");
        }

        Some(WorkflowEvent::Failed {
            workflow_id: workflow.id.clone(),
            step: job.kind,
            error,
        })
    }

    /// Publish the workflow's current snapshot.
    fn emit_workflow_update(&self, workflow: &Workflow) {
        self.emit(WorkflowEvent::Updated(WorkflowUpdate::from_workflow(workflow)));
    }

    fn emit(&self, event: WorkflowEvent) {
        let room = workflow_room(event.workflow_id());
        if let Some(transport) = self.inner.transport.read().as_ref() {
            if let Err(e) = transport.broadcast_event(&room, &event) {
                tracing::warn!("Transport broadcast to {} failed: {}", room, e);
            }
        }
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn logger_for(&self, workflow_id: &str) -> Option<Arc<WorkflowLogger>> {
        let settings = &self.inner.settings;
        if !settings.logging.workflow_logs {
            return None;
        }
        match WorkflowLogger::new(
            workflow_id,
            settings.paths.logs_dir(),
            LogConfig::from(&settings.logging),
        ) {
            Ok(logger) => {
                let logger = Arc::new(logger);
                self.inner
                    .loggers
                    .lock()
                    .insert(workflow_id.to_string(), Arc::clone(&logger));
                Some(logger)
            }
            Err(e) => {
                tracing::warn!("[{}] Workflow log unavailable: {}", workflow_id, e);
                None
            }
        }
    }

    fn existing_logger(&self, workflow_id: &str) -> Option<Arc<WorkflowLogger>> {
        self.inner.loggers.lock().get(workflow_id).cloned()
    }

    fn drop_logger(&self, workflow_id: &str) {
        if let Some(logger) = self.inner.loggers.lock().remove(workflow_id) {
            logger.close();
        }
    }
}

/// Reject requests that cannot produce a workflow.
fn validate_request(request: &GenerationRequest) -> OrchestratorResult<()> {
    if request.duration_secs == 0 {
        return Err(OrchestratorError::validation("duration must be positive"));
    }
    let has_scenario = request
        .scenario_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());
    let can_generate = request.options.generate_scenario && request.topic().is_some();
    if !has_scenario && !can_generate {
        return Err(OrchestratorError::validation(
            "either scenario_id or a topic with generate_scenario is required",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadDescriptor;
    use crate::orchestrator::types::StepOutput;
    use crate::queue::{JobId, QueueError};
    use crate::script::StaticScenarioService;
    use crate::workflow::{StepKind, StoreError, WorkflowStatus};

    /// Queue that records jobs without running them.
    #[derive(Default)]
    struct RecordingQueue {
        jobs: Mutex<Vec<StepJob>>,
        removed: Mutex<Vec<String>>,
    }

    impl JobQueue for RecordingQueue {
        fn enqueue(&self, job: StepJob) -> Result<JobId, QueueError> {
            let id = job.job_id.clone();
            self.jobs.lock().push(job);
            Ok(id)
        }

        fn remove_workflow_jobs(&self, workflow_id: &str) -> usize {
            self.removed.lock().push(workflow_id.to_string());
            let mut jobs = self.jobs.lock();
            let before = jobs.len();
            jobs.retain(|j| j.workflow_id != workflow_id);
            before - jobs.len()
        }

        fn stats(&self) -> QueueStats {
            QueueStats {
                waiting: self.jobs.lock().len(),
                ..QueueStats::default()
            }
        }
    }

    fn settings() -> Arc<Settings> {
        let mut settings = Settings::default();
        settings.logging.workflow_logs = false;
        Arc::new(settings)
    }

    fn setup() -> (VideoOrchestrator, Arc<RecordingQueue>) {
        let queue = Arc::new(RecordingQueue::default());
        let orch = VideoOrchestrator::builder(settings(), queue.clone()).build();
        (orch, queue)
    }

    fn job_ref(queue: &RecordingQueue, index: usize) -> JobRef {
        queue.jobs.lock()[index].job_ref()
    }

    fn upload() -> StepOutput {
        StepOutput::Upload(UploadDescriptor {
            platform: "local".into(),
            remote_id: "x".into(),
            url: "file:///x".into(),
            uploaded_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn start_creates_pending_steps_and_enqueues_first() {
        let (orch, queue) = setup();
        let id = orch
            .start_video_generation(GenerationRequest::for_topic("Docker", 120))
            .await
            .unwrap();

        let steps = orch.get_workflow_status(&id).unwrap();
        assert_eq!(steps.len(), 4);
        assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(steps[0].kind, StepKind::GenerateScript);

        let jobs = queue.jobs.lock();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].step_index, 0);
        assert_eq!(jobs[0].workflow_id, id);
    }

    #[tokio::test]
    async fn invalid_requests_create_nothing() {
        let (orch, queue) = setup();

        let mut no_source = GenerationRequest::for_topic("  ", 120);
        no_source.topic = None;
        assert!(matches!(
            orch.start_video_generation(no_source).await,
            Err(OrchestratorError::Validation(_))
        ));

        let zero = GenerationRequest::for_topic("Docker", 0);
        assert!(orch.start_video_generation(zero).await.is_err());

        let mut no_generation = GenerationRequest::for_topic("Docker", 120);
        no_generation.options.generate_scenario = false;
        assert!(orch.start_video_generation(no_generation).await.is_err());

        assert!(queue.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn scenario_ids_are_resolved() {
        let queue = Arc::new(RecordingQueue::default());
        let service = StaticScenarioService::new().with_scenario(Scenario {
            id: "sc-1".into(),
            title: "Docker".into(),
            description: None,
            introduction: None,
            conclusion: None,
            scenes: Vec::new(),
        });
        let orch = VideoOrchestrator::builder(settings(), queue.clone())
            .scenario_service(Arc::new(service))
            .build();

        let mut request = GenerationRequest::for_topic("Docker", 120);
        request.scenario_id = Some("sc-1".into());
        let id = orch.start_video_generation(request.clone()).await.unwrap();
        assert_eq!(
            orch.get_workflow(&id).unwrap().data.scenario.map(|s| s.id),
            Some("sc-1".to_string())
        );

        request.scenario_id = Some("missing".into());
        assert!(matches!(
            orch.start_video_generation(request).await,
            Err(OrchestratorError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn completion_advances_to_next_step() {
        let (orch, queue) = setup();
        let mut request = GenerationRequest::for_topic("Docker", 120);
        request.options.auto_upload = true;
        let id = orch.start_video_generation(request).await.unwrap();
        let mut bus = orch.subscribe();

        let first = job_ref(&queue, 0);
        orch.handle_queue_event(QueueEvent::Active(first.clone()));
        orch.handle_queue_event(QueueEvent::Progress {
            job: first.clone(),
            percent: 40,
        });
        orch.handle_queue_event(QueueEvent::Progress {
            job: first.clone(),
            percent: 20,
        });

        let steps = orch.get_workflow_status(&id).unwrap();
        assert_eq!(steps[0].status, StepStatus::Processing);
        assert_eq!(steps[0].progress, 40);

        orch.handle_queue_event(QueueEvent::Completed {
            job: first,
            output: upload(),
        });
        let wf = orch.get_workflow(&id).unwrap();
        assert_eq!(wf.steps[0].status, StepStatus::Completed);
        assert!(wf.steps[0].output.is_some());
        assert!(wf.data.upload.is_some());
        // Nothing is running between steps
        assert_eq!(wf.status(), WorkflowStatus::Pending);

        let jobs = queue.jobs.lock();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].step_index, 1);
        assert_eq!(jobs[1].kind, StepKind::CreateInfographics);
        assert!(jobs[1].data.upload.is_some());
        drop(jobs);

        // active, one accepted progress, completed
        let mut updates = 0;
        while let Ok(event) = bus.try_recv() {
            assert_eq!(event.name(), "workflow:update");
            updates += 1;
        }
        assert_eq!(updates, 3);
    }

    #[tokio::test]
    async fn final_failure_marks_step_and_workflow_failed() {
        let (orch, queue) = setup();
        let id = orch
            .start_video_generation(GenerationRequest::for_topic("Docker", 120))
            .await
            .unwrap();
        let mut bus = orch.subscribe();
        let job = job_ref(&queue, 0);

        orch.handle_queue_event(QueueEvent::Active(job.clone()));
        orch.handle_queue_event(QueueEvent::Failed {
            job: job.clone(),
            error: "LLM unavailable".into(),
            will_retry: true,
        });
        assert_eq!(
            orch.get_workflow_status(&id).unwrap()[0].status,
            StepStatus::Processing
        );

        orch.handle_queue_event(QueueEvent::Failed {
            job,
            error: "LLM unavailable".into(),
            will_retry: false,
        });

        let wf = orch.get_workflow(&id).unwrap();
        assert_eq!(wf.steps[0].status, StepStatus::Failed);
        assert_eq!(wf.steps[0].error.as_deref(), Some("LLM unavailable"));
        assert!(wf.steps[1..].iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(wf.status(), WorkflowStatus::Failed);

        let names: Vec<&str> = std::iter::from_fn(|| bus.try_recv().ok())
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["workflow:update", "workflow:update", "workflow:failed"]);
        assert_eq!(queue.jobs.lock().len(), 1);
    }

    #[tokio::test]
    async fn cancel_discards_late_completion() {
        let (orch, queue) = setup();
        let id = orch
            .start_video_generation(GenerationRequest::for_topic("Docker", 120))
            .await
            .unwrap();

        let first = job_ref(&queue, 0);
        orch.handle_queue_event(QueueEvent::Active(first.clone()));
        orch.handle_queue_event(QueueEvent::Completed {
            job: first,
            output: upload(),
        });
        let second = job_ref(&queue, 1);
        orch.handle_queue_event(QueueEvent::Active(second.clone()));

        assert!(orch.cancel_workflow(&id).unwrap());
        assert_eq!(queue.removed.lock().as_slice(), [id.clone()]);

        let statuses: Vec<StepStatus> = orch
            .get_workflow_status(&id)
            .unwrap()
            .iter()
            .map(|s| s.status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                StepStatus::Completed,
                StepStatus::Cancelled,
                StepStatus::Cancelled,
                StepStatus::Cancelled,
            ]
        );

        orch.handle_queue_event(QueueEvent::Completed {
            job: second,
            output: upload(),
        });
        let after = orch.get_workflow_status(&id).unwrap();
        assert_eq!(after[1].status, StepStatus::Cancelled);
        assert_eq!(
            orch.get_workflow(&id).unwrap().status(),
            WorkflowStatus::Cancelled
        );

        // Nothing left to cancel
        assert!(!orch.cancel_workflow(&id).unwrap());
        assert!(!orch.cancel_workflow("unknown").unwrap());
    }

    /// In-memory store that rejects the next `reject` writes.
    #[derive(Default)]
    struct UnreliableStore {
        inner: InMemoryWorkflowStore,
        reject: std::sync::atomic::AtomicUsize,
    }

    impl WorkflowStore for UnreliableStore {
        fn get(&self, id: &str) -> Option<Workflow> {
            self.inner.get(id)
        }

        fn put(&self, workflow: Workflow) -> Result<(), StoreError> {
            use std::sync::atomic::Ordering;
            let rejected = self
                .reject
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if rejected {
                return Err(StoreError::Io {
                    path: format!("{}.json", workflow.id).into(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.inner.put(workflow)
        }

        fn delete(&self, id: &str) -> Result<bool, StoreError> {
            self.inner.delete(id)
        }

        fn ids(&self) -> Vec<String> {
            self.inner.ids()
        }
    }

    #[tokio::test]
    async fn rejected_write_fails_workflow_without_advancing() {
        use std::sync::atomic::Ordering;

        let queue = Arc::new(RecordingQueue::default());
        let store = Arc::new(UnreliableStore::default());
        let orch = VideoOrchestrator::builder(settings(), queue.clone())
            .store(store.clone())
            .build();
        let id = orch
            .start_video_generation(GenerationRequest::for_topic("Docker", 120))
            .await
            .unwrap();
        let first = job_ref(&queue, 0);
        orch.handle_queue_event(QueueEvent::Active(first.clone()));
        let mut bus = orch.subscribe();

        store.reject.store(1, Ordering::SeqCst);
        orch.handle_queue_event(QueueEvent::Completed {
            job: first,
            output: upload(),
        });

        // Next step never queued, stored record shows the failure
        assert_eq!(queue.jobs.lock().len(), 1);
        let wf = orch.get_workflow(&id).unwrap();
        assert_eq!(wf.steps[0].status, StepStatus::Failed);
        assert!(wf.steps[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Failed to persist workflow"));
        assert!(wf.data.upload.is_none());
        assert_eq!(wf.status(), WorkflowStatus::Failed);

        let events: Vec<WorkflowEvent> = std::iter::from_fn(|| bus.try_recv().ok()).collect();
        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["workflow:update", "workflow:failed"]);
        match &events[0] {
            WorkflowEvent::Updated(update) => {
                assert_eq!(update.steps[0].status, StepStatus::Failed)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            &events[1],
            WorkflowEvent::Failed { step: StepKind::GenerateScript, .. }
        ));
    }

    #[tokio::test]
    async fn store_down_publishes_only_the_failure() {
        use std::sync::atomic::Ordering;

        let queue = Arc::new(RecordingQueue::default());
        let store = Arc::new(UnreliableStore::default());
        let orch = VideoOrchestrator::builder(settings(), queue.clone())
            .store(store.clone())
            .build();
        let id = orch
            .start_video_generation(GenerationRequest::for_topic("Docker", 120))
            .await
            .unwrap();
        let first = job_ref(&queue, 0);
        let mut bus = orch.subscribe();

        store.reject.store(usize::MAX, Ordering::SeqCst);
        orch.handle_queue_event(QueueEvent::Active(first));

        // Stored record is untouched and no snapshot of unsaved state went out
        assert_eq!(
            orch.get_workflow_status(&id).unwrap()[0].status,
            StepStatus::Pending
        );
        let names: Vec<&str> = std::iter::from_fn(|| bus.try_recv().ok())
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["workflow:failed"]);
    }

    #[tokio::test]
    async fn status_reads_are_idempotent() {
        let (orch, _queue) = setup();
        let id = orch
            .start_video_generation(GenerationRequest::for_topic("Docker", 120))
            .await
            .unwrap();
        let a = orch.get_workflow_status(&id).unwrap();
        let b = orch.get_workflow_status(&id).unwrap();
        assert_eq!(a, b);
        assert!(orch.get_workflow_status("nope").is_none());
    }
}
