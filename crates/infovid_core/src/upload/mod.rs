//! Publishing of finished videos.

mod error;
mod publish_dir;

pub use error::UploadError;
pub use publish_dir::PublishDirUploader;

use async_trait::async_trait;

use crate::models::{UploadDescriptor, VideoResult};

/// Publishes an encoded video somewhere reachable.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Short platform name recorded on the descriptor.
    fn platform(&self) -> &str;

    async fn upload(&self, video: &VideoResult) -> Result<UploadDescriptor, UploadError>;
}
