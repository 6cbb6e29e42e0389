//! Before/after element reconciliation.

use crate::types::ElementDescriptor;

/// Maximum per-axis shift (exclusive) for a selector-only match.
pub const PROXIMITY_LIMIT: f32 = 100.0;

/// The after-element chosen for one before-element, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementPair {
    pub before: usize,
    pub after: Option<usize>,
}

/// Pairs every before-element with at most one after-element.
///
/// The result has exactly one entry per before-element, in before order.
pub trait MatchingStrategy: Send + Sync {
    fn pair(&self, before: &[ElementDescriptor], after: &[ElementDescriptor]) -> Vec<ElementPair>;
}

/// First-match greedy pairing by id, then by selector within
/// [`PROXIMITY_LIMIT`] px on both axes.
///
/// Not injective: two before-elements may resolve to the same after-element.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyMatcher;

impl GreedyMatcher {
    fn is_match(before: &ElementDescriptor, after: &ElementDescriptor) -> bool {
        if let (Some(a), Some(b)) = (before.identity(), after.identity()) {
            if a == b {
                return true;
            }
        }
        before.selector == after.selector
            && (before.geometry.x - after.geometry.x).abs() < PROXIMITY_LIMIT
            && (before.geometry.y - after.geometry.y).abs() < PROXIMITY_LIMIT
    }
}

impl MatchingStrategy for GreedyMatcher {
    fn pair(&self, before: &[ElementDescriptor], after: &[ElementDescriptor]) -> Vec<ElementPair> {
        before
            .iter()
            .enumerate()
            .map(|(i, b)| ElementPair {
                before: i,
                after: after.iter().position(|a| Self::is_match(b, a)),
            })
            .collect()
    }
}

/// Before-elements that found no counterpart.
pub fn unmatched<'a>(
    pairs: &[ElementPair],
    before: &'a [ElementDescriptor],
) -> Vec<&'a ElementDescriptor> {
    pairs
        .iter()
        .filter(|p| p.after.is_none())
        .filter_map(|p| before.get(p.before))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{ElementBox, ImageState, StyleSubset};

    pub(crate) fn element(tag: &str, id: Option<&str>, class: Option<&str>, x: f32, y: f32) -> ElementDescriptor {
        ElementDescriptor::new(
            tag,
            id.map(str::to_string),
            class.map(|c| vec![c.to_string()]).unwrap_or_default(),
            "",
            StyleSubset::default(),
            ElementBox {
                x,
                y,
                width: 100.0,
                height: 40.0,
            },
            ImageState::default(),
            0,
        )
    }

    #[test]
    fn id_match_ignores_distance() {
        let before = vec![element("button", Some("buy"), None, 0.0, 0.0)];
        let after = vec![
            element("a", None, Some("x"), 0.0, 0.0),
            element("div", Some("buy"), None, 900.0, 2000.0),
        ];
        assert_eq!(
            GreedyMatcher.pair(&before, &after),
            vec![ElementPair {
                before: 0,
                after: Some(1)
            }]
        );
    }

    #[test]
    fn selector_match_requires_strict_proximity() {
        let before = vec![element("a", None, Some("btn"), 100.0, 100.0)];
        let near = vec![element("a", None, Some("btn"), 199.0, 1.0)];
        let edge = vec![element("a", None, Some("btn"), 200.0, 100.0)];
        assert_eq!(GreedyMatcher.pair(&before, &near)[0].after, Some(0));
        assert_eq!(GreedyMatcher.pair(&before, &edge)[0].after, None);
    }

    #[test]
    fn first_candidate_wins_and_pairs_may_share_targets() {
        let before = vec![
            element("a", None, Some("btn"), 0.0, 0.0),
            element("a", None, Some("btn"), 10.0, 10.0),
        ];
        let after = vec![
            element("a", None, Some("btn"), 5.0, 5.0),
            element("a", None, Some("btn"), 10.0, 10.0),
        ];
        let pairs = GreedyMatcher.pair(&before, &after);
        assert_eq!(pairs[0].after, Some(0));
        assert_eq!(pairs[1].after, Some(0));
    }

    #[test]
    fn unmatched_lists_missing_before_elements() {
        let before = vec![
            element("h1", None, None, 0.0, 0.0),
            element("form", Some("checkout"), None, 0.0, 300.0),
        ];
        let after = vec![element("h1", None, None, 0.0, 20.0)];
        let pairs = GreedyMatcher.pair(&before, &after);
        let missing = unmatched(&pairs, &before);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].selector, "form#checkout");
    }
}
