//! Final report assembly and the four-value deployment verdict.

use chrono::Utc;
use std::path::PathBuf;

use super::aggregate::Verdict;
use super::capture::CaptureSet;
use crate::types::{
    CaptureSummary, ComparisonIssue, ComparisonReport, IssueSummary, Recommendation,
    ReportSeverity, ReportStatus, Severity, StageDegradation, StatusLevel, VisualDiffResult,
    VisualStatus,
};
use crate::Viewport;

/// Overall status, severity and recommendation for a completed comparison.
///
/// SAFE and WARNING cascade results only allow a deploy when nothing else
/// objects. `is_broken`, a CRITICAL issue or an unusable visual diff turn
/// either into REVIEW_REQUIRED.
pub fn verdict_outcome(
    status_level: StatusLevel,
    is_broken: bool,
    issues: &IssueSummary,
    visual: &VisualDiffResult,
) -> (ReportStatus, ReportSeverity, Recommendation) {
    let objected =
        is_broken || issues.count(Severity::Critical) > 0 || visual.status == VisualStatus::Error;
    match status_level {
        StatusLevel::Broken => (
            ReportStatus::Broken,
            ReportSeverity::Critical,
            Recommendation::DoNotDeploy,
        ),
        StatusLevel::Warning if objected => (
            ReportStatus::Warning,
            ReportSeverity::Warning,
            Recommendation::ReviewRequired,
        ),
        StatusLevel::Warning => (
            ReportStatus::Warning,
            ReportSeverity::Warning,
            Recommendation::DeployWithCaution,
        ),
        StatusLevel::Safe if objected => (
            ReportStatus::Safe,
            ReportSeverity::Warning,
            Recommendation::ReviewRequired,
        ),
        StatusLevel::Safe => (
            ReportStatus::Safe,
            ReportSeverity::Ok,
            Recommendation::SafeToDeploy,
        ),
    }
}

/// Everything a report is built from.
pub struct ReportParts {
    pub site_id: String,
    pub before_url: String,
    pub after_url: String,
    pub viewport: Viewport,
    pub delays: Vec<u64>,
    pub captures: CaptureSet,
    pub visual: VisualDiffResult,
    pub issues: Vec<ComparisonIssue>,
    pub verdict: Verdict,
    pub overlay_path: Option<PathBuf>,
    pub changed_elements_count: usize,
    pub degradations: Vec<StageDegradation>,
}

pub fn assemble(parts: ReportParts) -> ComparisonReport {
    let issues_summary = IssueSummary::from_issues(&parts.issues);
    let (status, severity, recommendation) = verdict_outcome(
        parts.verdict.status_level,
        parts.verdict.is_broken,
        &issues_summary,
        &parts.visual,
    );
    let capture_summaries = parts
        .captures
        .after
        .iter()
        .map(|a| CaptureSummary::of(&a.capture))
        .collect();

    ComparisonReport {
        id: None,
        site_id: parts.site_id,
        before_url: parts.before_url,
        after_url: parts.after_url,
        created_at: Utc::now(),
        viewport: parts.viewport,
        delays: parts.delays,
        before: parts.captures.before,
        after: parts.captures.after,
        visual: parts.visual,
        differences: parts.verdict.differences,
        issues: parts.issues,
        issues_summary,
        is_broken: parts.verdict.is_broken,
        status_level: parts.verdict.status_level,
        binary_recommendation: parts.verdict.binary_recommendation,
        status,
        severity,
        recommendation,
        overlay_path: parts.overlay_path,
        changed_elements_count: parts.changed_elements_count,
        capture_summaries,
        degradations: parts.degradations,
    }
}
