//! The comparison engine: request validation and stage orchestration.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::aggregate::{aggregate, differences};
use super::capture::{plan_delays, CaptureOrchestrator};
use super::classifier::ChangeClassifier;
use super::matcher::{unmatched, GreedyMatcher, MatchingStrategy};
use super::overlay::{HighlightBox, OverlayRenderer};
use super::report::{assemble, ReportParts};
use super::stage::Stage;
use super::visual::VisualDiffer;
use crate::artifacts::ArtifactDir;
use crate::browser::Renderer;
use crate::scripts::{PatternScriptClassifier, ScriptRiskClassifier};
use crate::types::ComparisonReport;
use crate::{GuardError, Result, Viewport};

pub const MISSING_FIELDS_MESSAGE: &str = "Missing: beforeUrl, afterUrl, siteId";

/// Settle delays as sent by callers: a list or a single value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelayInput {
    Many(Vec<i64>),
    One(i64),
}

impl DelayInput {
    pub fn as_slice(&self) -> &[i64] {
        match self {
            DelayInput::Many(values) => values,
            DelayInput::One(value) => std::slice::from_ref(value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    #[serde(default)]
    pub before_url: String,
    #[serde(default)]
    pub after_url: String,
    #[serde(default)]
    pub site_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delays: Option<DelayInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

impl CompareRequest {
    pub fn new(
        before_url: impl Into<String>,
        after_url: impl Into<String>,
        site_id: impl Into<String>,
    ) -> Self {
        Self {
            before_url: before_url.into(),
            after_url: after_url.into(),
            site_id: site_id.into(),
            ..Self::default()
        }
    }

    pub fn with_delays(mut self, delays: Vec<i64>) -> Self {
        self.delays = Some(DelayInput::Many(delays));
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    fn validate(&self) -> Result<()> {
        if [&self.before_url, &self.after_url, &self.site_id]
            .iter()
            .any(|v| v.trim().is_empty())
        {
            return Err(GuardError::invalid_request(MISSING_FIELDS_MESSAGE));
        }
        url::Url::parse(&self.before_url)?;
        url::Url::parse(&self.after_url)?;
        if let Some(vp) = self.viewport {
            if !vp.is_renderable() {
                return Err(GuardError::Config(format!("Invalid viewport {vp}")));
            }
        }
        Ok(())
    }
}

/// Caller-facing result: a report, or `{status: "failed", error}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CompareResponse {
    Report(Box<ComparisonReport>),
    Failed { status: FailedStatus, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedStatus {
    Failed,
}

impl CompareResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        CompareResponse::Failed {
            status: FailedStatus::Failed,
            error: error.into(),
        }
    }
}

/// Stateless comparison engine; one instance serves concurrent requests.
#[derive(Clone)]
pub struct ComparisonEngine {
    capture: CaptureOrchestrator,
    differ: VisualDiffer,
    matcher: Arc<dyn MatchingStrategy>,
    classifier: ChangeClassifier,
    overlay: Option<OverlayRenderer>,
    default_viewport: Viewport,
}

impl ComparisonEngine {
    /// Engine with the production primitives around `renderer`.
    pub fn new(renderer: Arc<dyn Renderer>, artifacts: ArtifactDir) -> Result<Self> {
        let scripts: Arc<dyn ScriptRiskClassifier> = Arc::new(PatternScriptClassifier::new()?);
        Ok(Self {
            capture: CaptureOrchestrator::new(renderer, artifacts),
            differ: VisualDiffer::default(),
            matcher: Arc::new(GreedyMatcher),
            classifier: ChangeClassifier::new(scripts),
            overlay: Some(OverlayRenderer::default()),
            default_viewport: Viewport::default(),
        })
    }

    pub fn with_capture(mut self, capture: CaptureOrchestrator) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_differ(mut self, differ: VisualDiffer) -> Self {
        self.differ = differ;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn MatchingStrategy>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_classifier(mut self, classifier: ChangeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// `None` disables overlay rendering.
    pub fn with_overlay(mut self, overlay: Option<OverlayRenderer>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_default_viewport(mut self, viewport: Viewport) -> Self {
        self.default_viewport = viewport;
        self
    }

    /// Runs one comparison. Capture failures abort with [`GuardError::Capture`];
    /// every later stage degrades instead of failing.
    pub async fn compare(&self, request: CompareRequest) -> Result<ComparisonReport> {
        request.validate()?;
        let started = Instant::now();
        let viewport = request.viewport.unwrap_or(self.default_viewport);
        let delays = plan_delays(request.delays.as_ref().map(DelayInput::as_slice));
        info!(
            site_id = %request.site_id,
            before = %request.before_url,
            after = %request.after_url,
            %viewport,
            ?delays,
            "starting comparison"
        );

        let captures = self
            .capture
            .capture_all(&request.before_url, &request.after_url, &delays, viewport)
            .await
            .inspect_err(|err| {
                warn!(
                    stage = %Stage::Capture,
                    policy = ?Stage::Capture.policy(),
                    error = %err,
                    "comparison aborted"
                );
            })?;
        let before = &captures.before;
        let primary = captures.primary_after();
        let mut degradations = Vec::new();

        info!("comparing visuals");
        let visual = self
            .differ
            .compare_files(&before.screenshot_path, &primary.screenshot_path)
            .record(Stage::VisualDiff, &mut degradations);

        let pairs = self.matcher.pair(&before.elements, &primary.elements);
        let missing: Vec<HighlightBox> = unmatched(&pairs, &before.elements)
            .into_iter()
            .map(HighlightBox::from)
            .collect();
        debug!(
            before = before.elements.len(),
            after = primary.elements.len(),
            unmatched = missing.len(),
            "elements matched"
        );

        info!("classifying element changes");
        let issues = self.classifier.classify(
            &before.elements,
            &primary.elements,
            &pairs,
            &primary.full_html,
        );
        let verdict = aggregate(differences(before, primary), &visual);

        let overlay_path = match (&self.overlay, missing.is_empty()) {
            (Some(overlay), false) => {
                info!(changed = missing.len(), "rendering overlay");
                Some(
                    overlay
                        .render(&primary.screenshot_path, viewport, &missing)
                        .record(Stage::Overlay, &mut degradations),
                )
            }
            _ => None,
        };

        let report = assemble(ReportParts {
            site_id: request.site_id,
            before_url: request.before_url,
            after_url: request.after_url,
            viewport,
            delays,
            changed_elements_count: missing.len(),
            captures,
            visual,
            issues,
            verdict,
            overlay_path,
            degradations,
        });
        info!(
            status = %report.status,
            recommendation = %report.recommendation,
            issues = report.issues_summary.total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "comparison finished"
        );
        Ok(report)
    }

    /// [`compare`](Self::compare) shaped as the caller-facing response.
    pub async fn respond(&self, request: CompareRequest) -> CompareResponse {
        match self.compare(request).await {
            Ok(report) => CompareResponse::Report(Box::new(report)),
            Err(err) => CompareResponse::failed(err.caller_message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserializes_list_or_single_delay() {
        let list: CompareRequest = serde_json::from_str(
            r#"{"beforeUrl":"https://a","afterUrl":"https://b","siteId":"s1","delays":[1000,2000]}"#,
        )
        .unwrap();
        assert_eq!(list.delays.unwrap().as_slice(), &[1000, 2000]);

        let single: CompareRequest = serde_json::from_str(
            r#"{"beforeUrl":"https://a","afterUrl":"https://b","siteId":"s1","delays":1500,"viewport":{"width":375,"height":812}}"#,
        )
        .unwrap();
        assert_eq!(single.delays.unwrap().as_slice(), &[1500]);
        assert_eq!(single.viewport.unwrap().width, 375);
    }

    #[test]
    fn missing_fields_use_fixed_message() {
        let err = CompareRequest::new("https://a", "", "s1").validate().unwrap_err();
        assert_eq!(err.caller_message(), MISSING_FIELDS_MESSAGE);

        let err = CompareRequest::new("https://a", "https://b", " ")
            .validate()
            .unwrap_err();
        assert_eq!(err.caller_message(), MISSING_FIELDS_MESSAGE);
    }

    #[test]
    fn malformed_urls_and_zero_viewports_are_rejected() {
        assert!(matches!(
            CompareRequest::new("not a url", "https://b", "s1").validate(),
            Err(GuardError::InvalidUrl(_))
        ));
        assert!(matches!(
            CompareRequest::new("https://a", "https://b", "s1")
                .with_viewport(Viewport { width: 0, height: 10 })
                .validate(),
            Err(GuardError::Config(_))
        ));
    }

    #[test]
    fn failed_response_serializes_status_and_error() {
        let json = serde_json::to_value(CompareResponse::failed("Failed to capture before: x")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "failed", "error": "Failed to capture before: x"})
        );
    }
}
