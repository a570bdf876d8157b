//! Workflow records, persistence and update events.
//!
//! A workflow is one video generation request walked through its step plan.
//! The orchestrator is the only writer; everything here is plain data plus
//! the storage and transport seams.

mod events;
mod store;
mod types;

pub use events::{
    workflow_room, JsonLinesTransport, TransportError, UpdateTransport, WorkflowEvent,
    WorkflowUpdate,
};
pub use store::{InMemoryWorkflowStore, JsonFileWorkflowStore, StoreError, WorkflowStore};
pub use types::{
    PipelineData, StepKind, StepStatus, SubtitleOutput, TransitionError, Workflow, WorkflowId,
    WorkflowStatus, WorkflowStep,
};
