//! Annotated screenshot marking elements that disappeared.
//!
//! The overlay is described as a vector [`OverlayScene`] and handed to an
//! [`ImageCompositor`], which flattens it onto the screenshot.

use image::{Rgba, RgbaImage};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::stage::StageOutcome;
use crate::types::ElementDescriptor;
use crate::Viewport;

const HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 255]);
const HIGHLIGHT_OPACITY: f32 = 0.3;
const STROKE_WIDTH: u32 = 3;
const LABEL_SIZE: u32 = 14;
const LABEL_OFFSET_X: i64 = 5;
const LABEL_BASELINE_Y: i64 = 20;

/// Region of an element to highlight, in page pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub tag: String,
}

impl From<&ElementDescriptor> for HighlightBox {
    fn from(el: &ElementDescriptor) -> Self {
        Self {
            x: el.geometry.x,
            y: el.geometry.y,
            width: el.geometry.width,
            height: el.geometry.height,
            tag: el.tag.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayShape {
    Rect {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        fill: Rgba<u8>,
        fill_opacity: f32,
        stroke: Rgba<u8>,
        stroke_width: u32,
    },
    /// Bold text whose baseline starts at (`x`, `y`).
    Label {
        x: i64,
        y: i64,
        text: String,
        size: u32,
        fill: Rgba<u8>,
        outline: Rgba<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayScene {
    pub width: u32,
    pub height: u32,
    pub shapes: Vec<OverlayShape>,
}

impl OverlayScene {
    pub fn highlight(viewport: Viewport, boxes: &[HighlightBox]) -> Self {
        let mut shapes = Vec::with_capacity(boxes.len() * 2);
        for b in boxes {
            let (x, y) = (b.x.round() as i64, b.y.round() as i64);
            shapes.push(OverlayShape::Rect {
                x,
                y,
                width: b.width.max(0.0).round() as u32,
                height: b.height.max(0.0).round() as u32,
                fill: HIGHLIGHT,
                fill_opacity: HIGHLIGHT_OPACITY,
                stroke: HIGHLIGHT,
                stroke_width: STROKE_WIDTH,
            });
            shapes.push(OverlayShape::Label {
                x: x.saturating_add(LABEL_OFFSET_X),
                y: y.saturating_add(LABEL_BASELINE_Y),
                text: b.tag.to_uppercase(),
                size: LABEL_SIZE,
                fill: Rgba([255, 255, 255, 255]),
                outline: Rgba([0, 0, 0, 255]),
            });
        }
        Self {
            width: viewport.width,
            height: viewport.height,
            shapes,
        }
    }
}

/// Flattens a vector overlay onto a base image and writes the result.
pub trait ImageCompositor: Send + Sync {
    fn compose(&self, base: &Path, scene: &OverlayScene, output: &Path) -> Result<(), String>;
}

/// Software compositor built on the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCompositor;

impl ImageCompositor for RasterCompositor {
    fn compose(&self, base: &Path, scene: &OverlayScene, output: &Path) -> Result<(), String> {
        let mut img = image::open(base)
            .map_err(|e| format!("open {}: {}", base.display(), e))?
            .to_rgba8();
        for shape in &scene.shapes {
            match shape {
                OverlayShape::Rect {
                    x,
                    y,
                    width,
                    height,
                    fill,
                    fill_opacity,
                    stroke,
                    stroke_width,
                } => {
                    fill_rect(&mut img, *x, *y, *width as i64, *height as i64, *fill, *fill_opacity);
                    stroke_rect(&mut img, *x, *y, *width as i64, *height as i64, *stroke, *stroke_width);
                }
                OverlayShape::Label {
                    x,
                    y,
                    text,
                    size,
                    fill,
                    outline,
                } => draw_label(&mut img, *x, *y, text, *size, *fill, *outline),
            }
        }
        img.save(output)
            .map_err(|e| format!("write {}: {}", output.display(), e))
    }
}

fn blend(px: &mut Rgba<u8>, color: Rgba<u8>, opacity: f32) {
    for c in 0..3 {
        let base = px[c] as f32;
        px[c] = (base + (color[c] as f32 - base) * opacity).round() as u8;
    }
    px[3] = px[3].max((opacity * 255.0).round() as u8);
}

fn blend_pixel(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, opacity: f32) {
    if x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 {
        return;
    }
    blend(img.get_pixel_mut(x as u32, y as u32), color, opacity);
}

/// `start..end` intersected with `0..limit`.
fn clamp_span(start: i64, end: i64, limit: u32) -> Range<u32> {
    let lo = start.clamp(0, limit as i64) as u32;
    let hi = end.clamp(0, limit as i64) as u32;
    lo..hi.max(lo)
}

/// Blends the half-open region `[x0, x1) x [y0, y1)`, clipped to the image.
fn blend_region(
    img: &mut RgbaImage,
    (x0, y0): (i64, i64),
    (x1, y1): (i64, i64),
    color: Rgba<u8>,
    opacity: f32,
) {
    let xs = clamp_span(x0, x1, img.width());
    for py in clamp_span(y0, y1, img.height()) {
        for px in xs.clone() {
            blend(img.get_pixel_mut(px, py), color, opacity);
        }
    }
}

fn fill_rect(img: &mut RgbaImage, x: i64, y: i64, w: i64, h: i64, color: Rgba<u8>, opacity: f32) {
    blend_region(
        img,
        (x, y),
        (x.saturating_add(w), y.saturating_add(h)),
        color,
        opacity,
    );
}

/// Stroke centred on the rectangle edge, drawn as four opaque bands.
fn stroke_rect(img: &mut RgbaImage, x: i64, y: i64, w: i64, h: i64, color: Rgba<u8>, width: u32) {
    let inner = width as i64 / 2;
    let outer = width as i64 - inner;
    let right = x.saturating_add(w);
    let bottom = y.saturating_add(h);
    let (x0, y0, x1, y1) = (
        x.saturating_sub(inner),
        y.saturating_sub(inner),
        right.saturating_add(outer),
        bottom.saturating_add(outer),
    );
    let (inner_top, inner_bottom) = (y.saturating_add(outer), bottom.saturating_sub(inner));
    blend_region(img, (x0, y0), (x1, inner_top), color, 1.0);
    blend_region(img, (x0, inner_bottom), (x1, y1), color, 1.0);
    blend_region(img, (x0, inner_top), (x.saturating_add(outer), inner_bottom), color, 1.0);
    blend_region(img, (right.saturating_sub(inner), inner_top), (x1, inner_bottom), color, 1.0);
}

fn draw_label(
    img: &mut RgbaImage,
    x: i64,
    baseline: i64,
    text: &str,
    size: u32,
    fill: Rgba<u8>,
    outline: Rgba<u8>,
) {
    let scale = (size / GLYPH_HEIGHT).max(1) as i64;
    let advance = (GLYPH_WIDTH as i64 + 1) * scale + 1;
    let text_width = text.chars().count() as i64 * advance;
    let top = baseline.saturating_sub(GLYPH_HEIGHT as i64 * scale);
    // Outline pixels reach one past the glyph box on every side.
    if x > img.width() as i64
        || x.saturating_add(text_width) < -1
        || top > img.height() as i64
        || baseline < -1
    {
        return;
    }
    // Bold: every glyph pixel is widened by one column.
    let mut plot = |color: Rgba<u8>, dx: i64, dy: i64| {
        let mut cursor = x;
        for c in text.chars() {
            let rows = glyph(c);
            for (row, &bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let gx = cursor + col as i64 * scale;
                    let gy = top + row as i64 * scale;
                    for sy in 0..scale {
                        for sx in 0..=scale {
                            blend_pixel(img, gx + sx + dx, gy + sy + dy, color, 1.0);
                        }
                    }
                }
            }
            cursor += advance;
        }
    };
    for (dx, dy) in [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)] {
        plot(outline, dx, dy);
    }
    plot(fill, 0, 0);
}

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01110, 0b10001, 0b10000, 0b01110, 0b00001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00110, 0b01000, 0b10000, 0b11111],
        '3' => [0b01110, 0b10001, 0b00001, 0b00110, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b01110, 0b10000, 0b11110, 0b10001, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00001, 0b01110],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        ' ' => [0; 7],
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}

/// `<stem>-highlighted.png` next to `screenshot`.
pub fn highlighted_path(screenshot: &Path) -> PathBuf {
    let stem = screenshot
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "screenshot".to_string());
    screenshot.with_file_name(format!("{stem}-highlighted.png"))
}

#[derive(Clone)]
pub struct OverlayRenderer {
    compositor: Arc<dyn ImageCompositor>,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(Arc::new(RasterCompositor))
    }
}

impl OverlayRenderer {
    pub fn new(compositor: Arc<dyn ImageCompositor>) -> Self {
        Self { compositor }
    }

    /// Writes the annotated copy of `screenshot` and returns its path.
    ///
    /// With no boxes, or when composition fails, the input path is returned.
    pub fn render(
        &self,
        screenshot: &Path,
        viewport: Viewport,
        boxes: &[HighlightBox],
    ) -> StageOutcome<PathBuf> {
        if boxes.is_empty() {
            return StageOutcome::Completed(screenshot.to_path_buf());
        }
        let scene = OverlayScene::highlight(viewport, boxes);
        let output = highlighted_path(screenshot);
        match self.compositor.compose(screenshot, &scene, &output) {
            Ok(()) => {
                debug!(boxes = boxes.len(), path = %output.display(), "overlay written");
                StageOutcome::Completed(output)
            }
            Err(reason) => {
                warn!(%reason, "overlay composition failed; keeping plain screenshot");
                StageOutcome::Degraded {
                    fallback: screenshot.to_path_buf(),
                    reason,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x: f32, y: f32, tag: &str) -> HighlightBox {
        HighlightBox {
            x,
            y,
            width: 60.0,
            height: 40.0,
            tag: tag.into(),
        }
    }

    #[test]
    fn scene_has_rect_and_upper_case_label_per_box() {
        let scene = OverlayScene::highlight(Viewport::default(), &[boxed(10.0, 30.0, "button")]);
        assert_eq!((scene.width, scene.height), (1920, 1080));
        assert_eq!(scene.shapes.len(), 2);
        match &scene.shapes[1] {
            OverlayShape::Label { x, y, text, size, .. } => {
                assert_eq!((*x, *y), (15, 50));
                assert_eq!(text, "BUTTON");
                assert_eq!(*size, 14);
            }
            other => panic!("expected label, got {other:?}"),
        }
    }

    #[test]
    fn highlighted_path_keeps_directory() {
        assert_eq!(
            highlighted_path(Path::new("/tmp/a/after1-17-x.png")),
            PathBuf::from("/tmp/a/after1-17-x-highlighted.png")
        );
    }

    #[test]
    fn raster_compositor_tints_box_and_draws_stroke() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("shot.png");
        RgbaImage::from_pixel(200, 120, Rgba([255, 255, 255, 255]))
            .save(&base)
            .unwrap();

        let out = OverlayRenderer::default().render(
            &base,
            Viewport {
                width: 200,
                height: 120,
            },
            &[HighlightBox {
                x: 20.0,
                y: 20.0,
                width: 120.0,
                height: 80.0,
                tag: "a".into(),
            }],
        );
        assert!(!out.is_degraded());
        let path = out.value().clone();
        assert_eq!(path, dir.path().join("shot-highlighted.png"));

        let img = image::open(&path).unwrap().to_rgba8();
        // interior: white blended 30% towards red
        let tinted = img.get_pixel(100, 90);
        assert_eq!(tinted[0], 255);
        assert!((178..=179).contains(&tinted[1]), "got {tinted:?}");
        assert_eq!(tinted[1], tinted[2]);
        // stroke on the left edge
        assert_eq!(img.get_pixel(20, 60), &Rgba([255, 0, 0, 255]));
        // untouched outside the box
        assert_eq!(img.get_pixel(5, 5), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn empty_boxes_and_failures_return_input() {
        let renderer = OverlayRenderer::default();
        let missing = Path::new("/definitely/not/here.png");
        assert_eq!(
            renderer.render(missing, Viewport::default(), &[]),
            StageOutcome::Completed(missing.to_path_buf())
        );

        let degraded = renderer.render(missing, Viewport::default(), &[boxed(0.0, 0.0, "img")]);
        assert!(degraded.is_degraded());
        assert_eq!(degraded.value(), &missing.to_path_buf());
    }

    struct FailingCompositor;

    impl ImageCompositor for FailingCompositor {
        fn compose(&self, _base: &Path, _scene: &OverlayScene, _output: &Path) -> Result<(), String> {
            Err("compositor unavailable".into())
        }
    }

    #[test]
    fn failed_composition_leaves_screenshot_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("after.png");
        let mut img = RgbaImage::from_pixel(40, 30, Rgba([250, 250, 250, 255]));
        img.put_pixel(3, 4, Rgba([10, 20, 30, 255]));
        img.save(&base).unwrap();
        let original = std::fs::read(&base).unwrap();

        let out = OverlayRenderer::new(Arc::new(FailingCompositor)).render(
            &base,
            Viewport {
                width: 40,
                height: 30,
            },
            &[boxed(5.0, 5.0, "div")],
        );

        assert!(out.is_degraded());
        assert_eq!(out.value(), &base);
        assert_eq!(std::fs::read(out.value()).unwrap(), original);
        assert!(!highlighted_path(&base).exists());
    }

    #[test]
    fn oversized_boxes_are_clipped_to_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("shot.png");
        RgbaImage::from_pixel(30, 20, Rgba([255, 255, 255, 255]))
            .save(&base)
            .unwrap();

        let out = OverlayRenderer::default().render(
            &base,
            Viewport {
                width: 30,
                height: 20,
            },
            &[
                HighlightBox {
                    x: -1.0e6,
                    y: -1.0e6,
                    width: 4.0e9,
                    height: 4.0e9,
                    tag: "section".into(),
                },
                HighlightBox {
                    x: 1.0e9,
                    y: 1.0e9,
                    width: 4.0e9,
                    height: 4.0e9,
                    tag: "footer".into(),
                },
            ],
        );

        assert!(!out.is_degraded());
        let img = image::open(out.value()).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (30, 20));
        // The first box covers the whole image, so every pixel is tinted.
        assert!(img.pixels().all(|px| px[0] == 255 && px[1] < 255));
    }
}
