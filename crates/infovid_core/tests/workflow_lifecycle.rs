//! End-to-end workflow runs through the local job queue.
//!
//! Script, infographic and subtitle steps are the real ones; synthesis is
//! stubbed so the tests do not need FFmpeg.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::{broadcast, Notify};

use infovid_core::config::Settings;
use infovid_core::models::{
    GenerationRequest, MediaProbe, Scenario, ScenarioParams, UploadDescriptor, VideoMetadata,
    VideoResult,
};
use infovid_core::orchestrator::{
    CreateInfographicsStep, GenerateScriptStep, GenerateSubtitlesStep, PipelineStep, StepContext,
    StepOutput, StepRegistry, StepResult, UploadVideoStep, VideoOrchestrator,
};
use infovid_core::queue::{LocalJobQueue, RetryPolicy};
use infovid_core::script::{GeneratedScenario, ScenarioError, ScenarioService};
use infovid_core::subtitles::parse_srt;
use infovid_core::upload::{UploadError, Uploader};
use infovid_core::workflow::{
    JsonFileWorkflowStore, JsonLinesTransport, StepKind, StepStatus, WorkflowEvent,
    WorkflowStatus, WorkflowStore,
};

struct FakeSynthesis;

#[async_trait]
impl PipelineStep for FakeSynthesis {
    fn kind(&self) -> StepKind {
        StepKind::SynthesizeVideo
    }

    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutput> {
        let script = ctx.require_script(self.kind())?;
        let path = ctx.output_dir().join(format!("{}.mp4", ctx.workflow_id));
        std::fs::write(&path, b"not really a video")
            .map_err(|e| infovid_core::orchestrator::StepError::io_error("writing video", e))?;
        ctx.report_progress(100);

        Ok(StepOutput::Video(Box::new(VideoResult {
            video_id: ctx.workflow_id.clone(),
            project_id: ctx.data.request.project_id.clone(),
            user_id: ctx.data.request.user_id.clone(),
            path,
            thumbnail_path: ctx.output_dir().join("thumb.jpg"),
            duration_secs: script.total_duration_secs,
            file_size: 18,
            format: "mp4".into(),
            resolution: ctx.settings.video.resolution(),
            subtitle_paths: ctx.data.subtitles.iter().map(|s| s.path.clone()).collect(),
            infographic_paths: ctx.data.infographics.iter().map(|a| a.path.clone()).collect(),
            metadata: VideoMetadata {
                title: script.title.clone(),
                description: script.description(),
                keywords: script.keywords.clone(),
                generated_at: Utc::now(),
                processing_time_ms: 0,
                cost_usd: ctx.data.cost_usd,
                probe: MediaProbe::default(),
            },
        })))
    }
}

/// Infographics step that holds until released.
struct GatedInfographics {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl PipelineStep for GatedInfographics {
    fn kind(&self) -> StepKind {
        StepKind::CreateInfographics
    }

    async fn execute(&self, _ctx: &StepContext) -> StepResult<StepOutput> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(StepOutput::Infographics { assets: Vec::new() })
    }
}

struct DownLlm;

#[async_trait]
impl ScenarioService for DownLlm {
    async fn get_scenario(&self, _id: &str) -> Result<Option<Scenario>, ScenarioError> {
        Ok(None)
    }

    async fn generate_scenario(
        &self,
        _params: &ScenarioParams,
    ) -> Result<GeneratedScenario, ScenarioError> {
        Err(ScenarioError::Unavailable("LLM unavailable".into()))
    }
}

struct OfflinePlatform;

#[async_trait]
impl Uploader for OfflinePlatform {
    fn platform(&self) -> &str {
        "offline"
    }

    async fn upload(&self, _video: &VideoResult) -> Result<UploadDescriptor, UploadError> {
        Err(UploadError::Rejected("platform offline".into()))
    }
}

/// Cloneable in-memory writer for the JSON lines transport.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn settings(root: &Path) -> Arc<Settings> {
    let mut settings = Settings::default();
    settings.paths.output_folder = root.join("output").display().to_string();
    settings.paths.temp_root = root.join("tmp").display().to_string();
    settings.paths.logs_folder = root.join("logs").display().to_string();
    settings.paths.publish_folder = root.join("published").display().to_string();
    settings.video.width = 160;
    settings.video.height = 90;
    Arc::new(settings)
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(10))
}

fn start(
    settings: Arc<Settings>,
    registry: StepRegistry,
    store: Option<Arc<dyn WorkflowStore>>,
) -> VideoOrchestrator {
    let (queue, events) = LocalJobQueue::with_policy(Arc::new(registry), fast_retry(), 2);
    let mut builder = VideoOrchestrator::builder(settings, Arc::new(queue));
    if let Some(store) = store {
        builder = builder.store(store);
    }
    let orchestrator = builder.build();
    orchestrator.run(events);
    orchestrator
}

async fn wait_terminal(bus: &mut broadcast::Receiver<WorkflowEvent>, id: &str) -> WorkflowEvent {
    tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            match bus.recv().await {
                Ok(event) if event.is_terminal() && event.workflow_id() == id => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("workflow did not finish in time")
}

fn real_registry(settings: &Arc<Settings>) -> StepRegistry {
    StepRegistry::new(Arc::clone(settings))
        .with_step(GenerateScriptStep::new(settings.script.clone()))
        .with_step(CreateInfographicsStep::new())
        .with_step(GenerateSubtitlesStep::new(settings.subtitles.clone()))
        .with_step(FakeSynthesis)
}

#[tokio::test]
async fn full_run_completes_every_step() {
    let root = TempDir::new().unwrap();
    let settings = settings(root.path());
    let orchestrator = start(Arc::clone(&settings), real_registry(&settings), None);
    let buffer = SharedBuffer::default();
    orchestrator.set_transport(Arc::new(JsonLinesTransport::new(buffer.clone())));
    let mut bus = orchestrator.subscribe();

    let id = orchestrator
        .start_video_generation(GenerationRequest::for_topic("Kubernetes", 130))
        .await
        .unwrap();

    let event = wait_terminal(&mut bus, &id).await;
    let WorkflowEvent::Completed { result, .. } = event else {
        panic!("expected completion, got {:?}", event);
    };
    let video = result.expect("video result");
    assert_eq!(video.video_id, id);
    assert_eq!(video.infographic_paths.len(), 4);

    let workflow = orchestrator.get_workflow(&id).unwrap();
    assert_eq!(workflow.status(), WorkflowStatus::Completed);
    assert_eq!(workflow.progress(), 100);
    assert!(workflow
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Completed && s.output.is_some()));

    // Subtitles stay inside the timeline with small gaps
    let srt_path = workflow.data.subtitles.as_ref().unwrap().path.clone();
    let segments = parse_srt(&std::fs::read_to_string(srt_path).unwrap()).unwrap();
    assert!(segments.last().unwrap().end_ms <= 130_000);
    for pair in segments.windows(2) {
        assert!(pair[1].start_ms >= pair[0].end_ms);
        assert!(pair[1].start_ms - pair[0].end_ms <= 200);
    }

    // Transport saw updates and the completion, all in the workflow's room
    let text = String::from_utf8(buffer.0.lock().clone()).unwrap();
    let room = format!("\"room\":\"workflow:{}\"", id);
    assert!(text.lines().all(|l| l.contains(&room)));
    assert!(text.contains("\"event\":\"workflow:update\""));
    assert!(text.contains("\"event\":\"workflow:completed\""));

    assert!(root.path().join("logs").join(format!("{}.log", id)).exists());
}

#[tokio::test]
async fn unavailable_llm_fails_the_first_step() {
    let root = TempDir::new().unwrap();
    let settings = settings(root.path());
    let registry = StepRegistry::new(Arc::clone(&settings))
        .with_step(
            GenerateScriptStep::new(settings.script.clone())
                .with_scenario_service(Arc::new(DownLlm)),
        )
        .with_step(CreateInfographicsStep::new());
    let orchestrator = start(Arc::clone(&settings), registry, None);
    let mut bus = orchestrator.subscribe();

    let id = orchestrator
        .start_video_generation(GenerationRequest::for_topic("Docker", 120))
        .await
        .unwrap();

    match wait_terminal(&mut bus, &id).await {
        WorkflowEvent::Failed { step, error, .. } => {
            assert_eq!(step, StepKind::GenerateScript);
            assert_eq!(error, "LLM unavailable");
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let steps = orchestrator.get_workflow_status(&id).unwrap();
    assert_eq!(steps[0].status, StepStatus::Failed);
    assert_eq!(steps[0].error.as_deref(), Some("LLM unavailable"));
    assert!(steps[1..].iter().all(|s| s.status == StepStatus::Pending));
    assert_eq!(
        orchestrator.get_workflow(&id).unwrap().status(),
        WorkflowStatus::Failed
    );
}

#[tokio::test]
async fn cancel_mid_run_ignores_the_running_step() {
    let root = TempDir::new().unwrap();
    let settings = settings(root.path());
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let registry = StepRegistry::new(Arc::clone(&settings))
        .with_step(GenerateScriptStep::new(settings.script.clone()))
        .with_step(GatedInfographics {
            started: Arc::clone(&started),
            release: Arc::clone(&release),
        })
        .with_step(GenerateSubtitlesStep::new(settings.subtitles.clone()))
        .with_step(FakeSynthesis);
    let orchestrator = start(Arc::clone(&settings), registry, None);
    let mut bus = orchestrator.subscribe();

    let id = orchestrator
        .start_video_generation(GenerationRequest::for_topic("Docker", 120))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(10), started.notified())
        .await
        .expect("infographics step never started");
    // Let the Active event for step 1 land
    tokio::time::timeout(Duration::from_secs(10), async {
        while orchestrator.get_workflow_status(&id).unwrap()[1].status != StepStatus::Processing {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("step 1 never reached processing");

    assert!(orchestrator.cancel_workflow(&id).unwrap());
    assert!(matches!(
        wait_terminal(&mut bus, &id).await,
        WorkflowEvent::Cancelled { .. }
    ));

    release.notify_one();
    // Give the late completion time to arrive and be discarded
    tokio::time::sleep(Duration::from_millis(100)).await;

    let statuses: Vec<StepStatus> = orchestrator
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
    assert_eq!(orchestrator.queue_stats().waiting, 0);
    assert!(!root
        .path()
        .join("output")
        .join(format!("{}.srt", id))
        .exists());
}

#[tokio::test]
async fn workflows_survive_a_store_reopen() {
    let root = TempDir::new().unwrap();
    let settings = settings(root.path());
    let store_dir = root.path().join("workflows");
    let store: Arc<dyn WorkflowStore> = Arc::new(JsonFileWorkflowStore::open(&store_dir).unwrap());
    let orchestrator = start(Arc::clone(&settings), real_registry(&settings), Some(store));
    let mut bus = orchestrator.subscribe();

    let id = orchestrator
        .start_video_generation(GenerationRequest::for_topic("Rust", 120))
        .await
        .unwrap();
    wait_terminal(&mut bus, &id).await;

    let reopened = JsonFileWorkflowStore::open(&store_dir).unwrap();
    let workflow = reopened.get(&id).expect("persisted workflow");
    assert_eq!(workflow.status(), WorkflowStatus::Completed);
    assert_eq!(workflow.data.script.unwrap().title, "Rust explained");

    // Reading twice gives the same answer
    assert_eq!(
        orchestrator.get_workflow_status(&id),
        orchestrator.get_workflow_status(&id)
    );
}

#[tokio::test]
async fn upload_failure_keeps_the_encoded_video() {
    let root = TempDir::new().unwrap();
    let settings = settings(root.path());
    let registry =
        real_registry(&settings).with_step(UploadVideoStep::new(Arc::new(OfflinePlatform)));
    let orchestrator = start(Arc::clone(&settings), registry, None);
    let mut bus = orchestrator.subscribe();

    let mut request = GenerationRequest::for_topic("Terraform", 120);
    request.options.auto_upload = true;
    let id = orchestrator.start_video_generation(request).await.unwrap();

    match wait_terminal(&mut bus, &id).await {
        WorkflowEvent::Failed { step, error, .. } => {
            assert_eq!(step, StepKind::UploadVideo);
            assert_eq!(step.to_string(), "upload-video");
            assert!(error.contains("platform offline"), "{}", error);
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let workflow = orchestrator.get_workflow(&id).unwrap();
    assert_eq!(workflow.status(), WorkflowStatus::Failed);
    let statuses: Vec<StepStatus> = workflow.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::Completed,
            StepStatus::Completed,
            StepStatus::Completed,
            StepStatus::Completed,
            StepStatus::Failed,
        ]
    );
    assert_eq!(workflow.steps[3].kind, StepKind::SynthesizeVideo);
    assert!(workflow.data.upload.is_none());

    // The artifact from the successful synthesis stays where it was written
    let video = workflow.data.video.as_ref().expect("video result");
    assert!(video.path.exists());
    assert_eq!(
        video.path,
        root.path().join("output").join(format!("{}.mp4", id))
    );
}
