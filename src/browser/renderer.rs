use futures::future::BoxFuture;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::SnapshotCapture;
use crate::Viewport;

/// One capture the renderer is asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub url: String,
    /// Settle delay applied after network quiescence, in milliseconds.
    pub delay_ms: u64,
    pub viewport: Viewport,
    /// Where the full-page screenshot must be written.
    pub screenshot_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Unable to spawn renderer; '{command}' was not found on PATH")]
    NodeUnavailable { command: String },

    #[error("Playwright npm package is missing; install with `npm install playwright`.")]
    PlaywrightMissing,

    #[error("Renderer timed out after {0:?}")]
    Timeout(Duration),

    #[error("{message}")]
    Script { status: String, message: String },

    #[error("Unexpected renderer output: {0}")]
    Output(String),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("Renderer IO error: {0}")]
    Io(#[from] io::Error),
}

/// A page renderer producing one isolated session per capture.
///
/// Implementations must not share page state between calls; every capture
/// starts from a fresh browser context.
pub trait Renderer: Send + Sync {
    fn capture<'a>(
        &'a self,
        request: &'a CaptureRequest,
    ) -> BoxFuture<'a, Result<SnapshotCapture, RenderError>>;
}
