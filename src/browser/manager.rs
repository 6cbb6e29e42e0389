//! Playwright-backed [`Renderer`].
//!
//! Every capture spawns its own `node` helper, so sessions never share page
//! state. The child is killed if the capture future is dropped, which lets the
//! caller bound a capture with `tokio::time::timeout`.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fs;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use super::playwright::{
    map_playwright_error, map_playwright_status_error, map_spawn_error, CAPTURE_SCRIPT,
};
use super::renderer::{CaptureRequest, RenderError, Renderer};
use super::snapshot::{into_snapshot, ScriptEnvelope};
use crate::types::SnapshotCapture;

/// Hard navigation timeout honoured by the helper.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// The Node.js command to use (default: "node").
    pub node_command: String,
    pub headless: bool,
    pub navigation_timeout: Duration,
    /// Optional cap on the stored full HTML, in characters.
    pub html_limit: Option<usize>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            headless: true,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            html_limit: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaywrightRenderer {
    options: BrowserOptions,
}

impl PlaywrightRenderer {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BrowserOptions {
        &self.options
    }

    async fn run_playwright(
        &self,
        request: &CaptureRequest,
    ) -> Result<SnapshotCapture, RenderError> {
        if let Some(parent) = request.screenshot_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut cmd = Command::new(&self.options.node_command);
        cmd.arg("-e")
            .arg(CAPTURE_SCRIPT)
            .arg(&request.url)
            .arg(request.viewport.width.to_string())
            .arg(request.viewport.height.to_string())
            .arg(self.options.navigation_timeout.as_millis().to_string())
            .arg(request.delay_ms.to_string())
            .arg(request.screenshot_path.to_string_lossy().to_string())
            .arg(if self.options.headless { "1" } else { "0" })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(url = %request.url, delay_ms = request.delay_ms, "spawning playwright helper");
        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|err| map_spawn_error(err, &self.options.node_command))?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout_pipe {
                let _ = out.read_to_end(&mut buf).await;
            }
            buf
        });

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut err) = stderr_pipe {
                let _ = err.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = child.wait().await?;
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(map_playwright_error(status.to_string(), &stderr));
        }

        let stdout = String::from_utf8_lossy(&stdout);
        let envelope: ScriptEnvelope = serde_json::from_str(stdout.trim()).map_err(|e| {
            RenderError::Output(format!("{} - raw: {}", e, stdout.trim()))
        })?;

        if envelope.status != "ok" {
            let message = envelope
                .message
                .unwrap_or_else(|| "no additional details".to_string());
            return Err(map_playwright_status_error(&envelope.status, message));
        }

        let raw = envelope.capture.ok_or_else(|| {
            RenderError::Output("helper returned ok status but no capture data".to_string())
        })?;

        let snapshot = into_snapshot(raw, request, self.options.html_limit, start.elapsed());
        debug!(
            url = %request.url,
            elements = snapshot.elements.len(),
            elapsed_ms = snapshot.elapsed_ms,
            "capture finished"
        );
        Ok(snapshot)
    }
}

impl Renderer for PlaywrightRenderer {
    fn capture<'a>(
        &'a self,
        request: &'a CaptureRequest,
    ) -> BoxFuture<'a, Result<SnapshotCapture, RenderError>> {
        self.run_playwright(request).boxed()
    }
}
