//! Turns matched element pairs and script findings into regression issues.
//!
//! Every rule is evaluated independently for every before-element. A rule
//! whose inputs are missing or unparsable is skipped without an issue.

use std::sync::Arc;

use super::matcher::ElementPair;
use crate::scripts::{ScriptFinding, ScriptRisk, ScriptRiskClassifier};
use crate::types::{ComparisonIssue, ElementDescriptor, IssueState, IssueType, Severity};

/// Font size change (percent, exclusive) that counts as a regression.
pub const FONT_CHANGE_PERCENT: i64 = 20;
/// Font size change (percent, exclusive) that raises severity to HIGH.
pub const FONT_CHANGE_HIGH_PERCENT: i64 = 40;
/// Positional shift (px, exclusive) on either axis that counts as a move.
pub const POSITION_SHIFT_LIMIT: f32 = 50.0;
/// Vertical shift (px, exclusive) that raises a move to HIGH.
pub const POSITION_SHIFT_HIGH: f32 = 100.0;

#[derive(Clone)]
pub struct ChangeClassifier {
    scripts: Arc<dyn ScriptRiskClassifier>,
}

impl ChangeClassifier {
    pub fn new(scripts: Arc<dyn ScriptRiskClassifier>) -> Self {
        Self { scripts }
    }

    /// Issues for every before-element, followed by script findings from
    /// `after_html`.
    pub fn classify(
        &self,
        before: &[ElementDescriptor],
        after: &[ElementDescriptor],
        pairs: &[ElementPair],
        after_html: &str,
    ) -> Vec<ComparisonIssue> {
        let mut issues: Vec<ComparisonIssue> = pairs
            .iter()
            .filter_map(|pair| {
                let b = before.get(pair.before)?;
                Some(element_issues(b, pair.after.and_then(|i| after.get(i))))
            })
            .flatten()
            .collect();

        if !after_html.is_empty() {
            issues.extend(script_issues(&self.scripts.classify(after_html)));
        }
        issues
    }
}

/// All rule results for one before-element and its counterpart.
pub fn element_issues(
    before: &ElementDescriptor,
    after: Option<&ElementDescriptor>,
) -> Vec<ComparisonIssue> {
    let Some(after) = after else {
        return vec![issue(
            before,
            IssueType::ElementMissing,
            Severity::Critical,
            format!("{} element is completely missing", before.tag),
            Some(IssueState::Element(Box::new(before.clone()))),
            None,
        )];
    };

    [
        hidden_rule(before, after),
        visibility_rule(before, after),
        font_size_rule(before, after),
        color_rule(before, after),
        position_rule(before, after),
        image_rule(before, after),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// One RISKY_SCRIPT issue per finding.
pub fn script_issues(findings: &[ScriptFinding]) -> Vec<ComparisonIssue> {
    findings
        .iter()
        .map(|finding| ComparisonIssue {
            issue_type: IssueType::RiskyScript,
            severity: match finding.risk {
                ScriptRisk::High => Severity::Critical,
                ScriptRisk::Medium => Severity::Medium,
            },
            element: "script".to_string(),
            tag: "script".to_string(),
            detail: format!(
                "Found {} script: {}",
                finding.kind,
                finding.src.as_deref().unwrap_or("inline")
            ),
            before: None,
            after: Some(IssueState::Script {
                src: finding.src.clone(),
            }),
        })
        .collect()
}

fn issue(
    before: &ElementDescriptor,
    issue_type: IssueType,
    severity: Severity,
    detail: String,
    before_state: Option<IssueState>,
    after_state: Option<IssueState>,
) -> ComparisonIssue {
    ComparisonIssue {
        issue_type,
        severity,
        element: before.selector.clone(),
        tag: before.tag.clone(),
        detail,
        before: before_state,
        after: after_state,
    }
}

fn hidden_rule(before: &ElementDescriptor, after: &ElementDescriptor) -> Option<ComparisonIssue> {
    let (b, a) = (before.style.display.as_deref()?, after.style.display.as_deref()?);
    (b != "none" && a == "none").then(|| {
        issue(
            before,
            IssueType::Hidden,
            Severity::Critical,
            "Element hidden with CSS (display: none)".to_string(),
            Some(IssueState::Display { display: b.into() }),
            Some(IssueState::Display { display: a.into() }),
        )
    })
}

fn visibility_rule(
    before: &ElementDescriptor,
    after: &ElementDescriptor,
) -> Option<ComparisonIssue> {
    let (b, a) = (
        before.style.visibility.as_deref()?,
        after.style.visibility.as_deref()?,
    );
    (b != "hidden" && a == "hidden").then(|| {
        issue(
            before,
            IssueType::VisibilityHidden,
            Severity::High,
            "Element hidden with CSS (visibility: hidden)".to_string(),
            Some(IssueState::Visibility {
                visibility: b.into(),
            }),
            Some(IssueState::Visibility {
                visibility: a.into(),
            }),
        )
    })
}

fn font_size_rule(
    before: &ElementDescriptor,
    after: &ElementDescriptor,
) -> Option<ComparisonIssue> {
    let (b, a) = (
        before.style.font_size.as_deref()?,
        after.style.font_size.as_deref()?,
    );
    if b == a {
        return None;
    }
    let before_px = leading_integer(b).filter(|v| *v != 0)?;
    let after_px = leading_integer(a)?;
    let change = ((after_px - before_px) as f64 / before_px as f64 * 100.0).round() as i64;
    if change.abs() <= FONT_CHANGE_PERCENT {
        return None;
    }
    let severity = if change.abs() > FONT_CHANGE_HIGH_PERCENT {
        Severity::High
    } else {
        Severity::Medium
    };
    let sign = if change > 0 { "+" } else { "" };
    Some(issue(
        before,
        IssueType::FontSizeChanged,
        severity,
        format!("Font size: {b} → {a} ({sign}{change}%)"),
        Some(IssueState::FontSize {
            font_size: b.into(),
        }),
        Some(IssueState::FontSize {
            font_size: a.into(),
        }),
    ))
}

fn color_rule(before: &ElementDescriptor, after: &ElementDescriptor) -> Option<ComparisonIssue> {
    let (b, a) = (before.style.color.as_deref()?, after.style.color.as_deref()?);
    (b != a).then(|| {
        issue(
            before,
            IssueType::ColorChanged,
            Severity::Medium,
            format!("Text color changed: {b} → {a}"),
            Some(IssueState::Color { color: b.into() }),
            Some(IssueState::Color { color: a.into() }),
        )
    })
}

fn position_rule(
    before: &ElementDescriptor,
    after: &ElementDescriptor,
) -> Option<ComparisonIssue> {
    let (b, a) = (before.geometry, after.geometry);
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    if dx <= POSITION_SHIFT_LIMIT && dy <= POSITION_SHIFT_LIMIT {
        return None;
    }
    let severity = if dy > POSITION_SHIFT_HIGH {
        Severity::High
    } else {
        Severity::Low
    };
    Some(issue(
        before,
        IssueType::PositionChanged,
        severity,
        format!("Position shifted: ({}, {}) → ({}, {})", b.x, b.y, a.x, a.y),
        Some(IssueState::Position { x: b.x, y: b.y }),
        Some(IssueState::Position { x: a.x, y: a.y }),
    ))
}

fn image_rule(before: &ElementDescriptor, after: &ElementDescriptor) -> Option<ComparisonIssue> {
    let was_loaded = before.image.is_image && before.image.loaded == Some(true);
    let now_broken = after.image.is_image && after.image.loaded == Some(false);
    (was_loaded && now_broken).then(|| ComparisonIssue {
        issue_type: IssueType::ImageBroken,
        severity: Severity::High,
        element: before.selector.clone(),
        tag: "img".to_string(),
        detail: format!(
            "Image failed to load: {}",
            after.image.source.as_deref().unwrap_or_default()
        ),
        before: Some(IssueState::Image {
            loaded: true,
            src: before.image.source.clone(),
        }),
        after: Some(IssueState::Image {
            loaded: false,
            src: after.image.source.clone(),
        }),
    })
}

/// Leading (optionally signed) integer of a CSS length, e.g. `"16.5px"` → 16.
fn leading_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|v| sign * v)
}
