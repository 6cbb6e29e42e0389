//! Pixel-level comparison of the before and primary-after screenshots.

use image::{imageops, RgbaImage};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::stage::StageOutcome;
use crate::types::{VisualDiffResult, VisualStatus};

/// Per-pixel colour tolerance passed to the pixel-diff primitive.
pub const PIXEL_THRESHOLD: f64 = 0.1;

/// Changed-pixel share (percent) above which the page is visually broken.
pub const VISUAL_BREAK_PERCENT: f64 = 5.0;

/// Counts differing pixels between two equally sized images.
pub trait PixelDiff: Send + Sync {
    fn diff(&self, a: &RgbaImage, b: &RgbaImage, threshold: f64) -> Result<u64, String>;
}

/// pixelmatch-compatible YIQ colour distance, without anti-aliasing detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct YiqPixelDiff;

/// Largest YIQ delta between any two colours.
const MAX_YIQ_DELTA: f64 = 35215.0;

impl YiqPixelDiff {
    fn blend(channel: u8, alpha: f64) -> f64 {
        255.0 + (channel as f64 - 255.0) * alpha
    }

    fn yiq(px: &image::Rgba<u8>) -> (f64, f64, f64) {
        let a = px[3] as f64 / 255.0;
        let r = Self::blend(px[0], a);
        let g = Self::blend(px[1], a);
        let b = Self::blend(px[2], a);
        (
            r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23,
            r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89,
            r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94,
        )
    }

    fn delta(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> f64 {
        if a == b {
            return 0.0;
        }
        let (y1, i1, q1) = Self::yiq(a);
        let (y2, i2, q2) = Self::yiq(b);
        let (dy, di, dq) = (y1 - y2, i1 - i2, q1 - q2);
        0.5053 * dy * dy + 0.299 * di * di + 0.1957 * dq * dq
    }
}

impl PixelDiff for YiqPixelDiff {
    fn diff(&self, a: &RgbaImage, b: &RgbaImage, threshold: f64) -> Result<u64, String> {
        if a.dimensions() != b.dimensions() {
            return Err(format!(
                "image sizes differ: {:?} vs {:?}",
                a.dimensions(),
                b.dimensions()
            ));
        }
        let max_delta = MAX_YIQ_DELTA * threshold * threshold;
        Ok(a.pixels()
            .zip(b.pixels())
            .filter(|(pa, pb)| Self::delta(pa, pb) > max_delta)
            .count() as u64)
    }
}

#[derive(Clone)]
pub struct VisualDiffer {
    primitive: Arc<dyn PixelDiff>,
}

impl Default for VisualDiffer {
    fn default() -> Self {
        Self::new(Arc::new(YiqPixelDiff))
    }
}

impl VisualDiffer {
    pub fn new(primitive: Arc<dyn PixelDiff>) -> Self {
        Self { primitive }
    }

    /// Diffs two screenshot files, degrading to an ERROR verdict on any
    /// read or size problem.
    pub fn compare_files(&self, before: &Path, after: &Path) -> StageOutcome<VisualDiffResult> {
        let loaded = image::open(before)
            .and_then(|b| image::open(after).map(|a| (b.to_rgba8(), a.to_rgba8())));
        match loaded {
            Ok((b, a)) => self.compare(&b, &a),
            Err(e) => degraded(format!("failed to read screenshot: {e}")),
        }
    }

    /// Diffs the overlapping top-left region of both images.
    pub fn compare(&self, before: &RgbaImage, after: &RgbaImage) -> StageOutcome<VisualDiffResult> {
        let width = before.width().min(after.width());
        let height = before.height().min(after.height());
        if width == 0 || height == 0 {
            return degraded(format!(
                "no overlapping region between {:?} and {:?}",
                before.dimensions(),
                after.dimensions()
            ));
        }

        let a = crop(before, width, height);
        let b = crop(after, width, height);
        let pixels_changed = match self.primitive.diff(&a, &b, PIXEL_THRESHOLD) {
            Ok(count) => count,
            Err(e) => return degraded(e),
        };

        let total_pixels = width as u64 * height as u64;
        let raw_percent = pixels_changed as f64 / total_pixels as f64 * 100.0;
        let percent_changed = (raw_percent * 100.0).round() / 100.0;
        let status = if percent_changed > VISUAL_BREAK_PERCENT {
            VisualStatus::VisualBreak
        } else {
            VisualStatus::Ok
        };
        debug!(pixels_changed, total_pixels, percent_changed, "visual diff computed");

        StageOutcome::Completed(VisualDiffResult {
            success: true,
            pixels_changed,
            percent_changed,
            total_pixels,
            status,
            error: None,
        })
    }
}

fn crop(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        img.clone()
    } else {
        imageops::crop_imm(img, 0, 0, width, height).to_image()
    }
}

fn degraded(reason: String) -> StageOutcome<VisualDiffResult> {
    StageOutcome::Degraded {
        fallback: VisualDiffResult::failed(reason.clone()),
        reason,
    }
}
