use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::Result;

/// Default artifact location, relative to the working directory.
pub const DEFAULT_ARTIFACTS_DIR: &str = "pageguard-artifacts";

/// Shared directory for screenshots and overlays.
///
/// File names carry a millisecond timestamp and a random UUID so concurrent
/// comparisons writing into the same directory never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// `<label>-<utc millis>-<uuid v4>.png` inside the directory.
    pub fn screenshot_path(&self, label: &str) -> PathBuf {
        self.root.join(format!(
            "{}-{}-{}.png",
            label,
            Utc::now().timestamp_millis(),
            Uuid::new_v4()
        ))
    }
}

impl Default for ArtifactDir {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACTS_DIR)
    }
}
