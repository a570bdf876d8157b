//! Uploader that publishes into a local directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;

use super::{UploadError, Uploader};
use crate::models::{UploadDescriptor, VideoResult};

/// Copies the video and its thumbnail into `{root}/{video_id}/`.
#[derive(Debug, Clone)]
pub struct PublishDirUploader {
    root: PathBuf,
}

impl PublishDirUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

async fn copy_into(src: &Path, dir: &Path) -> Result<PathBuf, UploadError> {
    let name = src
        .file_name()
        .ok_or_else(|| UploadError::MissingArtifact(src.to_path_buf()))?;
    let dst = dir.join(name);
    tokio::fs::copy(src, &dst)
        .await
        .map_err(|source| UploadError::Copy {
            from: src.to_path_buf(),
            to: dst.clone(),
            source,
        })?;
    Ok(dst)
}

#[async_trait]
impl Uploader for PublishDirUploader {
    fn platform(&self) -> &str {
        "local"
    }

    async fn upload(&self, video: &VideoResult) -> Result<UploadDescriptor, UploadError> {
        if !video.path.exists() {
            return Err(UploadError::MissingArtifact(video.path.clone()));
        }

        let dir = self.root.join(&video.video_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| UploadError::Copy {
                from: video.path.clone(),
                to: dir.clone(),
                source,
            })?;

        let published = copy_into(&video.path, &dir).await?;
        if video.thumbnail_path.exists() {
            copy_into(&video.thumbnail_path, &dir).await?;
        } else {
            tracing::warn!(
                "Thumbnail {} missing, publishing video only",
                video.thumbnail_path.display()
            );
        }

        let absolute = std::path::absolute(&published).unwrap_or(published);
        tracing::info!("Published {} to {}", video.video_id, absolute.display());

        Ok(UploadDescriptor {
            platform: self.platform().to_string(),
            remote_id: video.video_id.clone(),
            url: format!("file://{}", absolute.display()),
            uploaded_at: Utc::now(),
        })
    }
}
