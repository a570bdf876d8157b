//! Progress reporting handed to step jobs.

use std::fmt;
use std::sync::Arc;

/// Receives progress percentages (0-100).
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Cheap, cloneable progress sink for one job.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// Reporter that drops every update.
    pub fn noop() -> Self {
        Self { callback: None }
    }

    /// Report progress; values above 100 are clamped.
    pub fn report(&self, percent: u8) {
        if let Some(ref callback) = self.callback {
            callback(percent.min(100));
        }
    }

    /// Report `done / total` as a percentage.
    pub fn report_fraction(&self, done: usize, total: usize) {
        if total == 0 {
            return;
        }
        self.report(((done.min(total) * 100) / total) as u8);
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("attached", &self.callback.is_some())
            .finish()
    }
}
