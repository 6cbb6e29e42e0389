//! Multi-sample capture orchestration.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

use crate::artifacts::ArtifactDir;
use crate::browser::{CaptureRequest, RenderError, Renderer, DEFAULT_NAVIGATION_TIMEOUT};
use crate::error::{CaptureFailure, CapturePhase};
use crate::types::{AfterCapture, SnapshotCapture};
use crate::Viewport;

pub const DEFAULT_DELAY_MS: u64 = 3000;
pub const MAX_AFTER_CAPTURES: usize = 3;

/// Added on top of navigation timeout and settle delay when bounding a capture.
pub const DEFAULT_CAPTURE_GRACE: Duration = Duration::from_secs(15);

/// Retained settle delays for a request: positive values only, at most
/// [`MAX_AFTER_CAPTURES`], falling back to `[DEFAULT_DELAY_MS]`.
pub fn plan_delays(requested: Option<&[i64]>) -> Vec<u64> {
    let delays: Vec<u64> = requested
        .unwrap_or_default()
        .iter()
        .filter(|d| **d > 0)
        .take(MAX_AFTER_CAPTURES)
        .map(|d| *d as u64)
        .collect();
    if delays.is_empty() {
        vec![DEFAULT_DELAY_MS]
    } else {
        delays
    }
}

/// One before-capture and one after-capture per retained delay.
#[derive(Debug, Clone)]
pub struct CaptureSet {
    pub before: SnapshotCapture,
    pub after: Vec<AfterCapture>,
}

impl CaptureSet {
    pub fn primary_after(&self) -> &SnapshotCapture {
        // capture_all always takes at least one after sample.
        &self.after[0].capture
    }
}

#[derive(Clone)]
pub struct CaptureOrchestrator {
    renderer: Arc<dyn Renderer>,
    artifacts: ArtifactDir,
    navigation_timeout: Duration,
    grace: Duration,
}

impl CaptureOrchestrator {
    pub fn new(renderer: Arc<dyn Renderer>, artifacts: ArtifactDir) -> Self {
        Self {
            renderer,
            artifacts,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            grace: DEFAULT_CAPTURE_GRACE,
        }
    }

    pub fn with_timeouts(mut self, navigation: Duration, grace: Duration) -> Self {
        self.navigation_timeout = navigation;
        self.grace = grace;
        self
    }

    pub fn artifacts(&self) -> &ArtifactDir {
        &self.artifacts
    }

    /// Upper bound on one capture at `delay_ms`.
    pub fn deadline(&self, delay_ms: u64) -> Duration {
        self.navigation_timeout + Duration::from_millis(delay_ms) + self.grace
    }

    /// Captures strictly in order: before at `delays[0]`, then each after.
    ///
    /// The first failure aborts the run; nothing is retried.
    pub async fn capture_all(
        &self,
        before_url: &str,
        after_url: &str,
        delays: &[u64],
        viewport: Viewport,
    ) -> Result<CaptureSet, CaptureFailure> {
        let delays = if delays.is_empty() {
            &[DEFAULT_DELAY_MS][..]
        } else {
            delays
        };
        let first_delay = delays[0];
        info!(url = %before_url, delay_ms = first_delay, "capturing before");
        let before = self
            .capture_one(before_url, first_delay, viewport, "before")
            .await
            .map_err(|source| CaptureFailure {
                phase: CapturePhase::Before,
                source,
            })?;

        let mut after = Vec::with_capacity(delays.len());
        for (i, &delay_ms) in delays.iter().enumerate() {
            info!(
                url = %after_url,
                delay_ms,
                sample = i + 1,
                of = delays.len(),
                "capturing after"
            );
            let capture = self
                .capture_one(after_url, delay_ms, viewport, &format!("after{}", i + 1))
                .await
                .map_err(|source| CaptureFailure {
                    phase: CapturePhase::After { delay_ms },
                    source,
                })?;
            after.push(AfterCapture { delay_ms, capture });
        }

        Ok(CaptureSet { before, after })
    }

    /// One standalone capture of `url`, as used by page analysis.
    pub async fn capture_page(
        &self,
        url: &str,
        delay_ms: u64,
        viewport: Viewport,
    ) -> Result<SnapshotCapture, CaptureFailure> {
        info!(%url, delay_ms, "capturing page");
        self.capture_one(url, delay_ms, viewport, "page")
            .await
            .map_err(|source| CaptureFailure {
                phase: CapturePhase::Page,
                source,
            })
    }

    async fn capture_one(
        &self,
        url: &str,
        delay_ms: u64,
        viewport: Viewport,
        label: &str,
    ) -> Result<SnapshotCapture, RenderError> {
        let request = CaptureRequest {
            url: url.to_string(),
            delay_ms,
            viewport,
            screenshot_path: self.artifacts.screenshot_path(label),
        };
        let deadline = self.deadline(delay_ms);
        match timeout(deadline, self.renderer.capture(&request)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout(deadline)),
        }
    }
}
