//! Deterministic renderer backed by capture files on disk.
//!
//! A URL maps to a fixture key (`fixture://cart` → `cart`,
//! `https://shop.example.com/cart` → `shop.example.com_cart`). For a capture at
//! delay `D` the renderer reads `<key>@<D>.json` if present, else `<key>.json`.
//! Each file has the raw capture shape plus two optional fields:
//!
//! - `screenshot`: PNG path (relative to the fixture dir) copied to the
//!   requested screenshot location; a blank white page is written otherwise
//! - `fail`: a message that makes the capture fail

use futures::future::BoxFuture;
use futures::FutureExt;
use image::{Rgba, RgbaImage};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

use super::renderer::{CaptureRequest, RenderError, Renderer};
use super::snapshot::{into_snapshot, RawCapture};
use crate::types::SnapshotCapture;

/// Environment variable switching the CLI to fixture rendering.
pub const FIXTURE_DIR_ENV: &str = "PAGEGUARD_FIXTURE_DIR";

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    screenshot: Option<PathBuf>,
    #[serde(default)]
    fail: Option<String>,
    #[serde(flatten)]
    capture: RawCapture,
}

#[derive(Debug, Clone)]
pub struct FixtureRenderer {
    root: PathBuf,
    html_limit: Option<usize>,
}

impl FixtureRenderer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            html_limit: None,
        }
    }

    pub fn with_html_limit(mut self, limit: Option<usize>) -> Self {
        self.html_limit = limit;
        self
    }

    /// Builds a renderer from [`FIXTURE_DIR_ENV`] when it is set and non-empty.
    pub fn from_env() -> Option<Self> {
        std::env::var(FIXTURE_DIR_ENV)
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(Self::new)
    }

    fn resolve(&self, url: &str, delay_ms: u64) -> Result<PathBuf, RenderError> {
        let key = fixture_key(url);
        let by_delay = self.root.join(format!("{key}@{delay_ms}.json"));
        if by_delay.is_file() {
            return Ok(by_delay);
        }
        let plain = self.root.join(format!("{key}.json"));
        if plain.is_file() {
            return Ok(plain);
        }
        Err(RenderError::Fixture(format!(
            "no fixture for {url} (looked for {} and {})",
            by_delay.display(),
            plain.display()
        )))
    }

    async fn load(&self, request: &CaptureRequest) -> Result<SnapshotCapture, RenderError> {
        let start = Instant::now();
        let path = self.resolve(&request.url, request.delay_ms)?;
        debug!(url = %request.url, fixture = %path.display(), "loading fixture capture");

        let raw = tokio::fs::read_to_string(&path).await?;
        let fixture: FixtureFile = serde_json::from_str(&raw)
            .map_err(|e| RenderError::Fixture(format!("{}: {}", path.display(), e)))?;

        if let Some(message) = fixture.fail {
            return Err(RenderError::Script {
                status: "error".to_string(),
                message,
            });
        }

        self.write_screenshot(fixture.screenshot.as_deref(), request)?;
        Ok(into_snapshot(
            fixture.capture,
            request,
            self.html_limit,
            start.elapsed(),
        ))
    }

    fn write_screenshot(
        &self,
        source: Option<&Path>,
        request: &CaptureRequest,
    ) -> Result<(), RenderError> {
        if let Some(parent) = request.screenshot_path.parent() {
            fs::create_dir_all(parent)?;
        }
        match source {
            Some(source) => {
                let source = self.root.join(source);
                fs::copy(&source, &request.screenshot_path).map_err(|e| {
                    RenderError::Fixture(format!("copy {}: {}", source.display(), e))
                })?;
            }
            None => {
                let blank = RgbaImage::from_pixel(
                    request.viewport.width,
                    request.viewport.height,
                    Rgba([255, 255, 255, 255]),
                );
                blank
                    .save(&request.screenshot_path)
                    .map_err(|e| RenderError::Fixture(e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl Renderer for FixtureRenderer {
    fn capture<'a>(
        &'a self,
        request: &'a CaptureRequest,
    ) -> BoxFuture<'a, Result<SnapshotCapture, RenderError>> {
        self.load(request).boxed()
    }
}

/// Maps a URL to the file-name key of its fixture.
pub fn fixture_key(url: &str) -> String {
    let (host, path) = match url::Url::parse(url) {
        Ok(parsed) => (
            parsed.host_str().unwrap_or_default().to_string(),
            parsed.path().to_string(),
        ),
        Err(_) => (String::new(), url.to_string()),
    };
    let joined = format!("{}/{}", host, path.trim_matches('/'));
    let key: String = joined
        .trim_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if key.is_empty() {
        "index".to_string()
    } else {
        key
    }
}
