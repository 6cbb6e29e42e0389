use futures::future::BoxFuture;
use futures::FutureExt;
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use pageguard_lib::browser::{CaptureRequest, RenderError, Renderer};
use pageguard_lib::compare::{CompareRequest, CompareResponse, ComparisonEngine};
use pageguard_lib::types::{
    BinaryRecommendation, Diagnostics, DomSummary, ElementBox, ElementDescriptor, ImageState,
    IssueType, Recommendation, ReportStatus, Severity, SnapshotCapture, StatusLevel, StyleSubset,
    VisualStatus,
};
use pageguard_lib::{ArtifactDir, Viewport};

const VIEWPORT: Viewport = Viewport {
    width: 100,
    height: 100,
};

/// What the scripted renderer returns for one URL.
#[derive(Clone, Default)]
struct Page {
    elements: Vec<ElementDescriptor>,
    diagnostics: Diagnostics,
    summary: DomSummary,
    full_html: String,
    /// Number of black pixels (in row-major order) on an otherwise white page.
    dark_pixels: u32,
    /// Skip writing the screenshot.
    no_screenshot: bool,
    fail: Option<String>,
}

#[derive(Default)]
struct ScriptedRenderer {
    pages: HashMap<String, Page>,
    calls: Mutex<Vec<(String, u64)>>,
}

impl ScriptedRenderer {
    fn new(pages: impl IntoIterator<Item = (&'static str, Page)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(url, page)| (url.to_string(), page))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Renderer for ScriptedRenderer {
    fn capture<'a>(
        &'a self,
        request: &'a CaptureRequest,
    ) -> BoxFuture<'a, Result<SnapshotCapture, RenderError>> {
        async move {
            self.calls
                .lock()
                .unwrap()
                .push((request.url.clone(), request.delay_ms));
            let page = self.pages.get(&request.url).cloned().unwrap_or_default();
            if let Some(message) = page.fail {
                return Err(RenderError::Script {
                    status: "error".into(),
                    message,
                });
            }
            if !page.no_screenshot {
                let mut img = RgbaImage::from_pixel(
                    request.viewport.width,
                    request.viewport.height,
                    Rgba([255, 255, 255, 255]),
                );
                for i in 0..page.dark_pixels {
                    let x = i % request.viewport.width;
                    let y = i / request.viewport.width;
                    img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
                }
                img.save(&request.screenshot_path).unwrap();
            }
            Ok(SnapshotCapture {
                url: request.url.clone(),
                delay_ms: request.delay_ms,
                viewport: request.viewport,
                title: Some("Shop".into()),
                diagnostics: page.diagnostics,
                summary: page.summary,
                elements: page.elements,
                screenshot_path: request.screenshot_path.clone(),
                body_html: String::new(),
                full_html: page.full_html,
                captured_at: chrono::Utc::now(),
                elapsed_ms: 5,
            })
        }
        .boxed()
    }
}

fn element(tag: &str, id: Option<&str>, x: f32, y: f32, style: StyleSubset) -> ElementDescriptor {
    ElementDescriptor::new(
        tag,
        id.map(str::to_string),
        vec![],
        "Buy now",
        style,
        ElementBox {
            x,
            y,
            width: 80.0,
            height: 30.0,
        },
        ImageState::default(),
        0,
    )
}

fn counts(buttons: u32) -> DomSummary {
    DomSummary {
        elements: 120,
        forms: 1,
        buttons,
        inputs: 2,
        images: 4,
    }
}

fn engine(renderer: Arc<ScriptedRenderer>, dir: &TempDir) -> ComparisonEngine {
    ComparisonEngine::new(renderer, ArtifactDir::new(dir.path()))
        .unwrap()
        .with_default_viewport(VIEWPORT)
}

fn request() -> CompareRequest {
    CompareRequest::new("https://shop.example", "https://staging.shop.example", "shop")
}

#[tokio::test]
async fn missing_element_is_critical_and_highlighted() {
    let dir = TempDir::new().unwrap();
    let renderer = Arc::new(ScriptedRenderer::new([
        (
            "https://shop.example",
            Page {
                elements: vec![element("button", Some("buy-now"), 100.0, 200.0, StyleSubset::default())],
                summary: counts(2),
                ..Page::default()
            },
        ),
        (
            "https://staging.shop.example",
            Page {
                elements: vec![element("button", Some("checkout"), 400.0, 600.0, StyleSubset::default())],
                summary: counts(2),
                ..Page::default()
            },
        ),
    ]));

    let report = engine(renderer, &dir).compare(request()).await.unwrap();

    let missing: Vec<_> = report
        .issues
        .iter()
        .filter(|i| i.issue_type == IssueType::ElementMissing)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].severity, Severity::Critical);
    assert_eq!(missing[0].element, "button#buy-now");
    assert!(missing[0].after.is_none());
    assert_eq!(missing[0].detail, "button element is completely missing");

    assert_eq!(report.changed_elements_count, 1);
    let overlay = report.overlay_path.as_ref().expect("overlay path");
    assert!(overlay.to_string_lossy().ends_with("-highlighted.png"));
    assert!(overlay.is_file());

    // Nothing in the cascade objects, but a critical issue blocks a clean pass.
    assert_eq!(report.status_level, StatusLevel::Safe);
    assert_eq!(report.status, ReportStatus::Safe);
    assert_eq!(report.recommendation, Recommendation::ReviewRequired);
    assert!(report.degradations.is_empty());
}

#[tokio::test]
async fn missing_button_with_count_change_still_requires_review() {
    let dir = TempDir::new().unwrap();
    let renderer = Arc::new(ScriptedRenderer::new([
        (
            "https://shop.example",
            Page {
                elements: vec![element("button", Some("buy-now"), 100.0, 200.0, StyleSubset::default())],
                summary: counts(2),
                ..Page::default()
            },
        ),
        (
            "https://staging.shop.example",
            Page {
                summary: counts(1),
                ..Page::default()
            },
        ),
    ]));

    let report = engine(renderer, &dir).compare(request()).await.unwrap();

    assert_eq!(report.differences.dom_changes.buttons_diff, -1);
    assert_eq!(report.status_level, StatusLevel::Warning);
    assert_eq!(report.issues_summary.critical, 1);
    assert_eq!(report.status, ReportStatus::Warning);
    assert_eq!(report.recommendation, Recommendation::ReviewRequired);
    assert!(!report.recommendation.allows_deploy());
}

#[tokio::test]
async fn font_shrink_is_medium_with_rounded_percent() {
    let dir = TempDir::new().unwrap();
    let font = |size: &str| StyleSubset {
        font_size: Some(size.into()),
        ..StyleSubset::default()
    };
    let renderer = Arc::new(ScriptedRenderer::new([
        (
            "https://shop.example",
            Page {
                elements: vec![element("h1", Some("title"), 10.0, 10.0, font("16px"))],
                ..Page::default()
            },
        ),
        (
            "https://staging.shop.example",
            Page {
                elements: vec![element("h1", Some("title"), 10.0, 10.0, font("10px"))],
                ..Page::default()
            },
        ),
    ]));

    let report = engine(renderer, &dir).compare(request()).await.unwrap();

    assert_eq!(report.issues.len(), 1);
    let issue = &report.issues[0];
    assert_eq!(issue.issue_type, IssueType::FontSizeChanged);
    assert_eq!(issue.severity, Severity::Medium);
    assert_eq!(issue.detail, "Font size: 16px → 10px (-38%)");
    assert!(report.overlay_path.is_none());
    assert_eq!(report.recommendation, Recommendation::SafeToDeploy);
}

#[tokio::test]
async fn moderate_visual_change_and_new_button_warn() {
    let dir = TempDir::new().unwrap();
    let renderer = Arc::new(ScriptedRenderer::new([
        (
            "https://shop.example",
            Page {
                summary: counts(2),
                ..Page::default()
            },
        ),
        (
            "https://staging.shop.example",
            Page {
                summary: counts(3),
                // 320 of 10000 pixels.
                dark_pixels: 320,
                ..Page::default()
            },
        ),
    ]));

    let report = engine(renderer, &dir).compare(request()).await.unwrap();

    assert_eq!(report.visual.status, VisualStatus::Ok);
    assert_eq!(report.visual.percent_changed, 3.2);
    assert_eq!(report.visual.total_pixels, 10_000);
    assert_eq!(report.differences.dom_changes.buttons_diff, 1);
    assert_eq!(report.differences.dom_changes.element_count_diff, 0);
    assert_eq!(report.status_level, StatusLevel::Warning);
    assert!(!report.is_broken);
    assert_eq!(report.binary_recommendation, BinaryRecommendation::Safe);
    assert_eq!(report.status, ReportStatus::Warning);
    assert_eq!(report.recommendation, Recommendation::DeployWithCaution);
}

#[tokio::test]
async fn at_most_three_delays_are_captured_in_order() {
    let dir = TempDir::new().unwrap();
    let renderer = Arc::new(ScriptedRenderer::default());

    let report = engine(renderer.clone(), &dir)
        .compare(request().with_delays(vec![1000, 2000, 5000, 9000]))
        .await
        .unwrap();

    assert_eq!(report.delays, vec![1000, 2000, 5000]);
    assert_eq!(report.after.len(), 3);
    assert_eq!(report.capture_summaries.len(), 3);
    assert_eq!(report.capture_summaries[2].delay_ms, 5000);
    assert_eq!(
        renderer.calls(),
        vec![
            ("https://shop.example".to_string(), 1000),
            ("https://staging.shop.example".to_string(), 1000),
            ("https://staging.shop.example".to_string(), 2000),
            ("https://staging.shop.example".to_string(), 5000),
        ]
    );
}

#[tokio::test]
async fn failed_before_capture_returns_failed_response() {
    let dir = TempDir::new().unwrap();
    let renderer = Arc::new(ScriptedRenderer::new([(
        "https://shop.example",
        Page {
            fail: Some("Navigation timeout of 60000 ms exceeded".into()),
            ..Page::default()
        },
    )]));

    let response = engine(renderer.clone(), &dir).respond(request()).await;

    assert!(matches!(response, CompareResponse::Failed { .. }));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({
            "status": "failed",
            "error": "Failed to capture before: Navigation timeout of 60000 ms exceeded"
        })
    );
    assert_eq!(renderer.calls().len(), 1, "no after capture is attempted");
}

#[tokio::test]
async fn missing_fields_are_rejected_before_capturing() {
    let dir = TempDir::new().unwrap();
    let renderer = Arc::new(ScriptedRenderer::default());

    let response = engine(renderer.clone(), &dir)
        .respond(CompareRequest::new("https://shop.example", "", "shop"))
        .await;

    assert_eq!(
        serde_json::to_value(&response).unwrap()["error"],
        "Missing: beforeUrl, afterUrl, siteId"
    );
    assert!(renderer.calls().is_empty());
}

#[tokio::test]
async fn unreadable_screenshot_degrades_visual_stage() {
    let dir = TempDir::new().unwrap();
    let renderer = Arc::new(ScriptedRenderer::new([(
        "https://staging.shop.example",
        Page {
            no_screenshot: true,
            ..Page::default()
        },
    )]));

    let report = engine(renderer, &dir).compare(request()).await.unwrap();

    assert_eq!(report.visual.status, VisualStatus::Error);
    assert!(!report.visual.success);
    assert_eq!(report.visual.percent_changed, 0.0);
    assert_eq!(report.degradations.len(), 1);
    assert_eq!(report.degradations[0].stage, "visual_diff");
    assert_eq!(report.recommendation, Recommendation::ReviewRequired);
}

#[tokio::test]
async fn new_runtime_error_and_risky_script_block_deploy() {
    let dir = TempDir::new().unwrap();
    let renderer = Arc::new(ScriptedRenderer::new([(
        "https://staging.shop.example",
        Page {
            diagnostics: Diagnostics {
                runtime_errors: vec!["ReferenceError: jQuery is not defined".into()],
                ..Diagnostics::default()
            },
            full_html: "<html><body><script>eval(window.payload)</script></body></html>".into(),
            ..Page::default()
        },
    )]));

    let report = engine(renderer, &dir).compare(request()).await.unwrap();

    assert_eq!(
        report.differences.new_errors,
        vec!["ReferenceError: jQuery is not defined".to_string()]
    );
    assert!(report.is_broken);
    assert_eq!(report.status, ReportStatus::Broken);
    assert_eq!(report.recommendation, Recommendation::DoNotDeploy);

    let script = report
        .issues
        .iter()
        .find(|i| i.issue_type == IssueType::RiskyScript)
        .expect("risky script issue");
    assert_eq!(script.severity, Severity::Critical);
    assert_eq!(script.detail, "Found inline script: inline");
}

#[tokio::test]
async fn one_engine_serves_concurrent_requests() {
    let dir = TempDir::new().unwrap();
    let renderer = Arc::new(ScriptedRenderer::default());
    let engine = engine(renderer.clone(), &dir);

    let (a, b) = tokio::join!(
        engine.compare(request()),
        engine.compare(CompareRequest::new(
            "https://other.example",
            "https://staging.other.example",
            "other"
        )),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.site_id, "shop");
    assert_eq!(b.site_id, "other");
    assert_ne!(a.before.screenshot_path, b.before.screenshot_path);
    assert_eq!(renderer.calls().len(), 4);
}
