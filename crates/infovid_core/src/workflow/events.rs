//! Workflow update events and real-time transports.

use std::io::Write;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{StepKind, Workflow, WorkflowId, WorkflowStatus, WorkflowStep};
use crate::models::VideoResult;

/// Snapshot published after every workflow transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowUpdate {
    pub workflow_id: WorkflowId,
    pub status: WorkflowStatus,
    /// Mean progress over all steps.
    pub progress: u8,
    pub steps: Vec<WorkflowStep>,
    pub timestamp: DateTime<Utc>,
}

impl WorkflowUpdate {
    pub fn from_workflow(workflow: &Workflow) -> Self {
        Self {
            workflow_id: workflow.id.clone(),
            status: workflow.status(),
            progress: workflow.progress(),
            steps: workflow.steps.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Events on the orchestrator's local bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WorkflowEvent {
    #[serde(rename = "workflow:update")]
    Updated(WorkflowUpdate),

    #[serde(rename = "workflow:completed")]
    Completed {
        workflow_id: WorkflowId,
        result: Option<Box<VideoResult>>,
    },

    #[serde(rename = "workflow:failed")]
    Failed {
        workflow_id: WorkflowId,
        step: StepKind,
        error: String,
    },

    #[serde(rename = "workflow:cancelled")]
    Cancelled { workflow_id: WorkflowId },
}

impl WorkflowEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::Updated(_) => "workflow:update",
            WorkflowEvent::Completed { .. } => "workflow:completed",
            WorkflowEvent::Failed { .. } => "workflow:failed",
            WorkflowEvent::Cancelled { .. } => "workflow:cancelled",
        }
    }

    pub fn workflow_id(&self) -> &str {
        match self {
            WorkflowEvent::Updated(update) => &update.workflow_id,
            WorkflowEvent::Completed { workflow_id, .. }
            | WorkflowEvent::Failed { workflow_id, .. }
            | WorkflowEvent::Cancelled { workflow_id } => workflow_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowEvent::Updated(_))
    }
}

/// Room a workflow's updates are published to.
pub fn workflow_room(workflow_id: &str) -> String {
    format!("workflow:{}", workflow_id)
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Real-time fan-out to clients watching a workflow.
pub trait UpdateTransport: Send + Sync {
    fn broadcast(&self, room: &str, update: &WorkflowUpdate) -> Result<(), TransportError>;

    /// Publish any bus event. Only updates are forwarded unless overridden.
    fn broadcast_event(&self, room: &str, event: &WorkflowEvent) -> Result<(), TransportError> {
        match event {
            WorkflowEvent::Updated(update) => self.broadcast(room, update),
            _ => Ok(()),
        }
    }
}

/// Writes one JSON object per event to a writer.
pub struct JsonLinesTransport<W: Write + Send> {
    writer: Mutex<W>,
}

#[derive(Serialize)]
struct Line<'a> {
    room: &'a str,
    #[serde(flatten)]
    event: &'a WorkflowEvent,
}

impl<W: Write + Send> JsonLinesTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_line(&self, room: &str, event: &WorkflowEvent) -> Result<(), TransportError> {
        let json = serde_json::to_string(&Line { room, event })?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> UpdateTransport for JsonLinesTransport<W> {
    fn broadcast(&self, room: &str, update: &WorkflowUpdate) -> Result<(), TransportError> {
        self.write_line(room, &WorkflowEvent::Updated(update.clone()))
    }

    fn broadcast_event(&self, room: &str, event: &WorkflowEvent) -> Result<(), TransportError> {
        self.write_line(room, event)
    }
}
