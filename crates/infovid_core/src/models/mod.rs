//! Data models shared by every pipeline stage.
//!
//! - Request types (what the caller asked for)
//! - Scenario types (input from the scenario collaborator)
//! - Script and section types (output of script generation)
//! - Asset and result types (outputs of rendering, synthesis and upload)

mod assets;
mod request;
mod scenario;
mod script;
mod video;

pub use assets::{ImageFormat, InfographicAsset};
pub use request::{AudienceLevel, GenerationOptions, GenerationRequest};
pub use scenario::{Scenario, ScenarioParams, Scene, VisualType};
pub use script::{Script, Section};
pub use video::{MediaProbe, StreamInfo, UploadDescriptor, VideoMetadata, VideoResult};
