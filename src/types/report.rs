//! Comparison report types.
//!
//! These are the shapes returned to callers and persisted by the report store:
//! - [`VisualDiffResult`] - pixel-level verdict for the primary capture pair
//! - [`Differences`] - diagnostic and DOM count deltas
//! - [`ComparisonReport`] - the assembled, immutable result of one request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::capture::{NetworkFailure, SnapshotCapture};
use super::issue::{ComparisonIssue, IssueSummary};
use crate::viewport::Viewport;
use crate::GuardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisualStatus {
    Ok,
    VisualBreak,
    Error,
}

/// Pixel-level verdict for the before/primary-after screenshot pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualDiffResult {
    pub success: bool,
    pub pixels_changed: u64,
    /// Share of changed pixels in percent, rounded to two decimals.
    pub percent_changed: f64,
    pub total_pixels: u64,
    pub status: VisualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VisualDiffResult {
    /// The neutral result used when the screenshots cannot be compared.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            pixels_changed: 0,
            percent_changed: 0.0,
            total_pixels: 0,
            status: VisualStatus::Error,
            error: Some(message.into()),
        }
    }
}

/// After-minus-before DOM count deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DomDeltas {
    pub element_count_changed: bool,
    pub element_count_diff: i64,
    pub forms_changed: bool,
    pub forms_diff: i64,
    pub buttons_changed: bool,
    pub buttons_diff: i64,
    pub inputs_changed: bool,
    pub inputs_diff: i64,
    pub images_changed: bool,
    pub images_diff: i64,
}

/// Signals present in the primary after-capture but not in the before-capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Differences {
    #[serde(default)]
    pub new_errors: Vec<String>,
    #[serde(default)]
    pub new_console_errors: Vec<String>,
    #[serde(default)]
    pub new_network_errors: Vec<NetworkFailure>,
    pub dom_changes: DomDeltas,
}

/// Three-level status produced by the aggregator cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusLevel {
    Safe,
    Warning,
    Broken,
}

/// Binary recommendation derived solely from `isBroken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BinaryRecommendation {
    Safe,
    Broken,
}

macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = GuardError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(GuardError::Config(format!(
                        "Unknown {} value: {}",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }
    };
}

/// Overall status of a stored report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Safe,
    Warning,
    Broken,
    Failed,
}

wire_enum!(ReportStatus {
    Safe => "SAFE",
    Warning => "WARNING",
    Broken => "BROKEN",
    Failed => "FAILED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportSeverity {
    Ok,
    Warning,
    Critical,
}

wire_enum!(ReportSeverity {
    Ok => "OK",
    Warning => "WARNING",
    Critical => "CRITICAL",
});

/// Deployment recommendation recorded with a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    SafeToDeploy,
    DeployWithCaution,
    DoNotDeploy,
    ReviewRequired,
}

wire_enum!(Recommendation {
    SafeToDeploy => "SAFE_TO_DEPLOY",
    DeployWithCaution => "DEPLOY_WITH_CAUTION",
    DoNotDeploy => "DO_NOT_DEPLOY",
    ReviewRequired => "REVIEW_REQUIRED",
});

impl Recommendation {
    /// Whether the recommendation allows the change to ship.
    pub fn allows_deploy(&self) -> bool {
        matches!(
            self,
            Recommendation::SafeToDeploy | Recommendation::DeployWithCaution
        )
    }
}

/// An after-capture tagged with the settle delay it was sampled at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AfterCapture {
    pub delay_ms: u64,
    pub capture: SnapshotCapture,
}

/// Compact per-sample diagnostics for every after-capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary {
    pub delay_ms: u64,
    pub errors: usize,
    pub console_errors: usize,
    pub network_errors: usize,
    pub elements: u32,
}

impl CaptureSummary {
    pub fn of(capture: &SnapshotCapture) -> Self {
        Self {
            delay_ms: capture.delay_ms,
            errors: capture.diagnostics.runtime_errors.len(),
            console_errors: capture.diagnostics.console_errors.len(),
            network_errors: capture.diagnostics.network_failures.len(),
            elements: capture.summary.elements,
        }
    }
}

/// A downstream stage that fell back to its neutral result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDegradation {
    pub stage: String,
    pub reason: String,
}

/// The assembled result of one comparison request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    /// Assigned by the report store; absent until the report is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub site_id: String,
    pub before_url: String,
    pub after_url: String,
    pub created_at: DateTime<Utc>,
    pub viewport: Viewport,
    pub delays: Vec<u64>,
    pub before: SnapshotCapture,
    pub after: Vec<AfterCapture>,
    pub visual: VisualDiffResult,
    pub differences: Differences,
    #[serde(default)]
    pub issues: Vec<ComparisonIssue>,
    pub issues_summary: IssueSummary,
    pub is_broken: bool,
    pub status_level: StatusLevel,
    pub binary_recommendation: BinaryRecommendation,
    pub status: ReportStatus,
    pub severity: ReportSeverity,
    pub recommendation: Recommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_path: Option<PathBuf>,
    pub changed_elements_count: usize,
    #[serde(default)]
    pub capture_summaries: Vec<CaptureSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<StageDegradation>,
}

impl ComparisonReport {
    /// The after-capture every diff and classification is computed against.
    pub fn primary_after(&self) -> Option<&SnapshotCapture> {
        self.after.first().map(|a| &a.capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_enums_round_trip_through_strings() {
        assert_eq!("safe".parse::<ReportStatus>().unwrap(), ReportStatus::Safe);
        assert_eq!(ReportStatus::Failed.to_string(), "FAILED");
        assert_eq!(
            "DEPLOY_WITH_CAUTION".parse::<Recommendation>().unwrap(),
            Recommendation::DeployWithCaution
        );
        assert!("MAYBE".parse::<Recommendation>().is_err());
        assert_eq!(ReportSeverity::Critical.as_str(), "CRITICAL");
    }

    #[test]
    fn failed_visual_result_is_neutral() {
        let result = VisualDiffResult::failed("unreadable png");
        assert!(!result.success);
        assert_eq!(result.percent_changed, 0.0);
        assert_eq!(result.status, VisualStatus::Error);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "ERROR");
        assert_eq!(json["percentChanged"], 0.0);
    }

    #[test]
    fn only_safe_and_caution_allow_deploy() {
        assert!(Recommendation::SafeToDeploy.allows_deploy());
        assert!(Recommendation::DeployWithCaution.allows_deploy());
        assert!(!Recommendation::DoNotDeploy.allows_deploy());
        assert!(!Recommendation::ReviewRequired.allows_deploy());
    }

    #[test]
    fn status_level_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&StatusLevel::Warning).unwrap(),
            "\"WARNING\""
        );
        assert_eq!(
            serde_json::to_string(&VisualStatus::VisualBreak).unwrap(),
            "\"VISUAL_BREAK\""
        );
    }
}
