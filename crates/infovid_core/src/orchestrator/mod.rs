//! Workflow orchestration.
//!
//! A generation request becomes a workflow whose steps run one at a time as
//! queue jobs. The orchestrator owns every state change: it enqueues the
//! first step, reacts to queue lifecycle events, merges step outputs and
//! enqueues the next step, and publishes an update after each transition.
//!
//! # Architecture
//!
//! ```text
//! VideoOrchestrator ──enqueue──▶ JobQueue ──process──▶ StepRegistry
//!        ▲                          │                     ├── GenerateScriptStep
//!        └──────── QueueEvent ──────┘                     ├── CreateInfographicsStep
//!                                                         ├── GenerateSubtitlesStep
//!                                                         ├── SynthesizeVideoStep
//!                                                         └── UploadVideoStep
//! ```
//!
//! # Example
//!
//! ```ignore
//! let settings = Arc::new(Settings::default());
//! let registry = Arc::new(default_registry(Arc::clone(&settings), None));
//! let (queue, events) = LocalJobQueue::new(registry, &settings.queue);
//!
//! let orchestrator = VideoOrchestrator::builder(settings, Arc::new(queue)).build();
//! orchestrator.run(events);
//!
//! let id = orchestrator
//!     .start_video_generation(GenerationRequest::for_topic("Docker", 120))
//!     .await?;
//! ```

mod engine;
mod errors;
mod plan;
mod registry;
mod step;
pub mod steps;
mod types;

pub use engine::{OrchestratorBuilder, VideoOrchestrator};
pub use errors::{OrchestratorError, OrchestratorResult, StepError, StepResult};
pub use plan::StepPlan;
pub use registry::StepRegistry;
pub use step::PipelineStep;
pub use steps::{
    default_registry, CreateInfographicsStep, GenerateScriptStep, GenerateSubtitlesStep,
    SynthesizeVideoStep, UploadVideoStep,
};
pub use types::{StepContext, StepOutput};
