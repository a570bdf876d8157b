//! Scratch directory removed on drop.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{MediaError, MediaResult};

/// Owns a working directory for one synthesis run.
///
/// The directory is removed when the guard drops, on success and on error
/// paths alike. Removal failures are logged, never raised.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create (or reuse) `path`, emptying anything left by an earlier run.
    pub fn create(path: impl Into<PathBuf>) -> MediaResult<Self> {
        let path = path.into();
        if path.exists() {
            fs::remove_dir_all(&path).map_err(|e| MediaError::io(&path, e))?;
        }
        fs::create_dir_all(&path).map_err(|e| MediaError::io(&path, e))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to remove scratch directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
