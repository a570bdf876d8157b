use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;

use infovid_core::config::{ConfigManager, Settings};
use infovid_core::logging::{init_tracing_with_file, LogLevel};
use infovid_core::models::{AudienceLevel, GenerationRequest};
use infovid_core::orchestrator::{default_registry, VideoOrchestrator};
use infovid_core::queue::LocalJobQueue;
use infovid_core::script::{LlmScenarioService, ScenarioService};
use infovid_core::workflow::{
    JsonFileWorkflowStore, JsonLinesTransport, WorkflowEvent, WorkflowStore,
};

/// CLI wrapper for AudienceLevel (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliAudience {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl From<CliAudience> for AudienceLevel {
    fn from(cli: CliAudience) -> Self {
        match cli {
            CliAudience::Beginner => AudienceLevel::Beginner,
            CliAudience::Intermediate => AudienceLevel::Intermediate,
            CliAudience::Advanced => AudienceLevel::Advanced,
        }
    }
}

#[derive(Parser)]
#[command(name = "infovid")]
#[command(about = "Generate infographic explainer videos with subtitles")]
#[command(version = infovid_core::version())]
struct Cli {
    /// Config file (created with defaults if missing)
    #[arg(short, long, global = true, default_value = "infovid.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a workflow to completion
    Generate {
        /// Topic of the video
        #[arg(short, long)]
        topic: Option<String>,

        /// Stored scenario to build the script from
        #[arg(long)]
        scenario_id: Option<String>,

        /// Total duration in seconds
        #[arg(short, long, default_value_t = 120)]
        duration: u32,

        #[arg(short, long, value_enum, default_value_t = CliAudience::Beginner)]
        audience: CliAudience,

        #[arg(short, long, default_value = "en")]
        language: String,

        /// Visual style: modern, minimal, playful, corporate
        #[arg(short, long, default_value = "modern")]
        style: String,

        /// Keyword to cover (repeatable)
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        user: Option<String>,

        /// Keep code examples from the scenario
        #[arg(long)]
        code_examples: bool,

        /// Append a short quiz section
        #[arg(long)]
        quiz: bool,

        /// Mix the configured background music under the video
        #[arg(long)]
        music: bool,

        /// Publish the video after encoding
        #[arg(long)]
        auto_upload: bool,

        /// Write workflow events to stdout as JSON lines
        #[arg(long)]
        events_json: bool,
    },

    /// Show a stored workflow (requires paths.workflows_folder)
    Status {
        workflow_id: String,
    },

    /// Write the config file with defaults and comments
    InitConfig,
}

fn load_settings(path: &PathBuf) -> Result<Settings> {
    let mut manager = ConfigManager::new(path);
    manager
        .load_or_create()
        .with_context(|| format!("loading config {}", path.display()))?;
    manager.ensure_dirs_exist()?;
    Ok(manager.into_settings())
}

fn open_store(settings: &Settings) -> Result<Option<Arc<dyn WorkflowStore>>> {
    let folder = settings.paths.workflows_folder.trim();
    if folder.is_empty() {
        return Ok(None);
    }
    let store = JsonFileWorkflowStore::open(folder)
        .with_context(|| format!("opening workflow store {}", folder))?;
    Ok(Some(Arc::new(store)))
}

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(100);
    let style =
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::InitConfig => {
            let manager = ConfigManager::new(&cli.config);
            manager.save()?;
            println!("Wrote {}", cli.config.display());
            Ok(())
        }
        Command::Status { workflow_id } => {
            let settings = load_settings(&cli.config)?;
            let Some(store) = open_store(&settings)? else {
                bail!("paths.workflows_folder is not set; no workflows are stored");
            };
            let Some(workflow) = store.get(&workflow_id) else {
                bail!("unknown workflow {}", workflow_id);
            };
            println!("{} {} ({}%)", workflow.id, workflow.status(), workflow.progress());
            for step in &workflow.steps {
                let error = step.error.as_deref().unwrap_or("");
                println!(
                    "  {:<20} {:<10} {:>3}% {}",
                    step.id,
                    step.status.as_str(),
                    step.progress,
                    error
                );
            }
            Ok(())
        }
        Command::Generate {
            topic,
            scenario_id,
            duration,
            audience,
            language,
            style,
            keywords,
            project,
            user,
            code_examples,
            quiz,
            music,
            auto_upload,
            events_json,
        } => {
            let settings = Arc::new(load_settings(&cli.config)?);
            let level: LogLevel = settings.logging.level.parse().unwrap_or_default();
            let _log_guard = init_tracing_with_file(level, settings.paths.logs_dir())
                .context("setting up log file")?;

            let mut request = GenerationRequest::for_topic(topic.unwrap_or_default(), duration);
            request.scenario_id = scenario_id;
            request.target_audience = audience.into();
            request.language = language;
            request.style = style;
            request.keywords = keywords;
            request.project_id = project.unwrap_or_else(|| "cli".to_string());
            request.user_id = user.unwrap_or_else(|| "local".to_string());
            request.options.include_code_examples = code_examples;
            request.options.include_quiz = quiz;
            request.options.background_music = music;
            request.options.auto_upload = auto_upload;

            run_generate(settings, request, events_json).await
        }
    }
}

async fn run_generate(
    settings: Arc<Settings>,
    request: GenerationRequest,
    events_json: bool,
) -> Result<()> {
    let scenarios: Option<Arc<dyn ScenarioService>> = if settings.scenario.enabled {
        Some(Arc::new(
            LlmScenarioService::from_settings(&settings.scenario)
                .context("configuring scenario generation")?,
        ))
    } else {
        None
    };

    let registry = default_registry(Arc::clone(&settings), scenarios.clone());
    let (queue, queue_events) = LocalJobQueue::new(Arc::new(registry), &settings.queue);

    let mut builder = VideoOrchestrator::builder(Arc::clone(&settings), Arc::new(queue.clone()));
    if let Some(store) = open_store(&settings)? {
        builder = builder.store(store);
    }
    if let Some(service) = scenarios {
        builder = builder.scenario_service(service);
    }
    let orchestrator = builder.build();
    if events_json {
        orchestrator.set_transport(Arc::new(JsonLinesTransport::new(std::io::stdout())));
    }
    orchestrator.run(queue_events);

    let mut bus = orchestrator.subscribe();
    let id = orchestrator.start_video_generation(request).await?;
    let pb = progress_bar(events_json);
    pb.set_message(format!("workflow {}", id));

    let outcome = loop {
        tokio::select! {
            received = bus.recv() => match received {
                Ok(WorkflowEvent::Updated(update)) if update.workflow_id == id => {
                    pb.set_position(update.progress as u64);
                    if let Some(step) = update
                        .steps
                        .iter()
                        .find(|s| s.status == infovid_core::workflow::StepStatus::Processing)
                    {
                        pb.set_message(format!("{} ({}%)", step.name, step.progress));
                    }
                }
                Ok(event) if event.is_terminal() && event.workflow_id() == id => break event,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("Progress display skipped {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => bail!("event bus closed"),
            },
            _ = tokio::signal::ctrl_c() => {
                pb.set_message("cancelling...");
                orchestrator.cancel_workflow(&id)?;
            }
        }
    };
    queue.close();

    match outcome {
        WorkflowEvent::Completed { result, .. } => {
            pb.finish_with_message("done");
            if let Some(video) = result {
                eprintln!("Video:     {}", video.path.display());
                eprintln!("Thumbnail: {}", video.thumbnail_path.display());
                eprintln!("Duration:  {:.1}s", video.duration_secs);
            }
            if let Some(upload) = orchestrator.get_workflow(&id).and_then(|w| w.data.upload) {
                eprintln!("Published: {}", upload.url);
            }
            Ok(())
        }
        WorkflowEvent::Failed { step, error, .. } => {
            pb.abandon_with_message("failed");
            bail!("{} failed: {}", step.display_name(), error)
        }
        WorkflowEvent::Cancelled { .. } => {
            pb.abandon_with_message("cancelled");
            bail!("workflow {} was cancelled", id)
        }
        WorkflowEvent::Updated(_) => bail!("workflow {} ended without a terminal event", id),
    }
}
