//! Combines diagnostics, DOM deltas and the visual verdict into a status.

use std::collections::HashSet;

use crate::types::{
    BinaryRecommendation, Differences, DomDeltas, DomSummary, SnapshotCapture, StatusLevel,
    VisualDiffResult, VisualStatus,
};

/// Changed-pixel share (percent) above which the status is BROKEN.
pub const BROKEN_PERCENT: f64 = 5.0;
/// Changed-pixel share (percent) above which the status is at least WARNING.
pub const WARNING_PERCENT: f64 = 2.0;
/// Element count delta (absolute, exclusive) that marks the page BROKEN.
pub const ELEMENT_COUNT_LIMIT: i64 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub differences: Differences,
    pub is_broken: bool,
    pub status_level: StatusLevel,
    pub binary_recommendation: BinaryRecommendation,
}

/// Signals present in `after` but not in `before`.
pub fn differences(before: &SnapshotCapture, after: &SnapshotCapture) -> Differences {
    let before_errors: HashSet<&str> = before
        .diagnostics
        .runtime_errors
        .iter()
        .map(String::as_str)
        .collect();
    let before_console: HashSet<&str> = before
        .diagnostics
        .console_errors
        .iter()
        .map(String::as_str)
        .collect();
    let before_network: HashSet<&str> = before
        .diagnostics
        .network_failures
        .iter()
        .map(|n| n.url.as_str())
        .collect();

    Differences {
        new_errors: after
            .diagnostics
            .runtime_errors
            .iter()
            .filter(|e| !before_errors.contains(e.as_str()))
            .cloned()
            .collect(),
        new_console_errors: after
            .diagnostics
            .console_errors
            .iter()
            .filter(|e| !before_console.contains(e.as_str()))
            .cloned()
            .collect(),
        new_network_errors: after
            .diagnostics
            .network_failures
            .iter()
            .filter(|n| !before_network.contains(n.url.as_str()))
            .cloned()
            .collect(),
        dom_changes: dom_deltas(&before.summary, &after.summary),
    }
}

pub fn dom_deltas(before: &DomSummary, after: &DomSummary) -> DomDeltas {
    let diff = |b: u32, a: u32| a as i64 - b as i64;
    let elements = diff(before.elements, after.elements);
    let forms = diff(before.forms, after.forms);
    let buttons = diff(before.buttons, after.buttons);
    let inputs = diff(before.inputs, after.inputs);
    let images = diff(before.images, after.images);
    DomDeltas {
        element_count_changed: elements != 0,
        element_count_diff: elements,
        forms_changed: forms != 0,
        forms_diff: forms,
        buttons_changed: buttons != 0,
        buttons_diff: buttons,
        inputs_changed: inputs != 0,
        inputs_diff: inputs,
        images_changed: images != 0,
        images_diff: images,
    }
}

/// Runs the isBroken check and the status cascade.
///
/// Input count changes feed `is_broken` only, image count changes feed
/// neither; button changes feed the status level only.
pub fn aggregate(differences: Differences, visual: &VisualDiffResult) -> Verdict {
    let dom = &differences.dom_changes;
    let has_new_errors = !differences.new_errors.is_empty();
    let has_new_console = !differences.new_console_errors.is_empty();

    let is_broken = has_new_errors
        || has_new_console
        || dom.element_count_changed
        || dom.forms_changed
        || dom.inputs_changed
        || visual.status == VisualStatus::VisualBreak;

    let status_level = if visual.percent_changed > BROKEN_PERCENT
        || has_new_errors
        || dom.element_count_diff.abs() > ELEMENT_COUNT_LIMIT
    {
        StatusLevel::Broken
    } else if visual.percent_changed > WARNING_PERCENT
        || has_new_console
        || dom.buttons_diff != 0
    {
        StatusLevel::Warning
    } else {
        StatusLevel::Safe
    };

    Verdict {
        differences,
        is_broken,
        status_level,
        binary_recommendation: if is_broken {
            BinaryRecommendation::Broken
        } else {
            BinaryRecommendation::Safe
        },
    }
}
