//! Regression issue types emitted by the change classifier.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::capture::ElementDescriptor;

/// Severity of a single regression issue.
///
/// Variants are declared in ascending order so the derived `Ord` gives
/// `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn all_descending() -> [Severity; 4] {
        [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    ElementMissing,
    Hidden,
    VisibilityHidden,
    FontSizeChanged,
    ColorChanged,
    PositionChanged,
    ImageBroken,
    RiskyScript,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IssueType::ElementMissing => "ELEMENT_MISSING",
            IssueType::Hidden => "HIDDEN",
            IssueType::VisibilityHidden => "VISIBILITY_HIDDEN",
            IssueType::FontSizeChanged => "FONT_SIZE_CHANGED",
            IssueType::ColorChanged => "COLOR_CHANGED",
            IssueType::PositionChanged => "POSITION_CHANGED",
            IssueType::ImageBroken => "IMAGE_BROKEN",
            IssueType::RiskyScript => "RISKY_SCRIPT",
        })
    }
}

/// The state of the inspected property on one side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IssueState {
    Element(Box<ElementDescriptor>),
    Display {
        display: String,
    },
    Visibility {
        visibility: String,
    },
    FontSize {
        #[serde(rename = "fontSize")]
        font_size: String,
    },
    Color {
        color: String,
    },
    Position {
        x: f32,
        y: f32,
    },
    Image {
        loaded: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        src: Option<String>,
    },
    Script {
        #[serde(skip_serializing_if = "Option::is_none")]
        src: Option<String>,
    },
}

/// One detected before/after difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    /// Selector of the subject element (`script` for script findings).
    pub element: String,
    pub tag: String,
    pub detail: String,
    pub before: Option<IssueState>,
    /// `None` only for [`IssueType::ElementMissing`].
    pub after: Option<IssueState>,
}

/// Issue counts per severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl IssueSummary {
    pub fn from_issues(issues: &[ComparisonIssue]) -> Self {
        let mut summary = IssueSummary {
            total: issues.len(),
            ..IssueSummary::default()
        };
        for issue in issues {
            match issue.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// The most severe level with at least one issue.
    pub fn highest(&self) -> Option<Severity> {
        Severity::all_descending()
            .into_iter()
            .find(|s| self.count(*s) > 0)
    }
}
