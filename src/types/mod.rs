//! Core data types shared by the capture, comparison and storage layers.

mod capture;
mod issue;
mod report;

pub use crate::viewport::Viewport;
pub use capture::{
    derive_selector, Diagnostics, DomSummary, ElementBox, ElementDescriptor, ImageState,
    NetworkFailure, SnapshotCapture, StyleSubset, BODY_HTML_LIMIT, MIN_ELEMENT_EDGE,
    TEXT_SNIPPET_LIMIT,
};
pub(crate) use capture::truncate_chars;
pub use issue::{ComparisonIssue, IssueState, IssueSummary, IssueType, Severity};
pub use report::{
    AfterCapture, BinaryRecommendation, CaptureSummary, ComparisonReport, Differences, DomDeltas,
    Recommendation, ReportSeverity, ReportStatus, StageDegradation, StatusLevel, VisualDiffResult,
    VisualStatus,
};
