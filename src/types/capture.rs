//! Snapshot types produced by a renderer capture.
//!
//! A [`SnapshotCapture`] is one rendered sample of a page at a given settle
//! delay. It is immutable once produced; the comparison stages only borrow it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::viewport::Viewport;

/// Minimum rendered box edge (exclusive) for an element to be described.
pub const MIN_ELEMENT_EDGE: f32 = 10.0;

/// Maximum number of characters kept from an element's inner text.
pub const TEXT_SNIPPET_LIMIT: usize = 50;

/// Maximum number of characters kept from the page body HTML.
pub const BODY_HTML_LIMIT: usize = 10_000;

/// Scroll-adjusted page geometry of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElementBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ElementBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Whether the box is large enough to be tracked across snapshots.
    pub fn exceeds_threshold(&self) -> bool {
        self.width > MIN_ELEMENT_EDGE && self.height > MIN_ELEMENT_EDGE
    }
}

/// The subset of computed CSS values the classifier inspects.
///
/// Values are kept as the browser reported them (e.g. `"16px"`,
/// `"rgb(0, 0, 0)"`); `None` means the renderer did not report the property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StyleSubset {
    pub display: Option<String>,
    pub visibility: Option<String>,
    pub opacity: Option<String>,
    pub font_size: Option<String>,
    pub color: Option<String>,
    pub background_color: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

/// Load state of an `<img>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageState {
    pub is_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded: Option<bool>,
}

/// Structured summary of one DOM element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    pub selector: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub style: StyleSubset,
    pub geometry: ElementBox,
    pub visible: bool,
    #[serde(default)]
    pub image: ImageState,
    pub index: usize,
}

impl ElementDescriptor {
    /// Builds a descriptor, deriving the selector, visibility flag and text
    /// snippet from the raw fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tag: impl Into<String>,
        id: Option<String>,
        classes: Vec<String>,
        text: &str,
        style: StyleSubset,
        geometry: ElementBox,
        image: ImageState,
        index: usize,
    ) -> Self {
        let tag = tag.into().to_ascii_lowercase();
        let id = id.filter(|v| !v.is_empty());
        let selector = derive_selector(&tag, id.as_deref(), &classes);
        let visible = geometry.area() > 0.0
            && style.display.as_deref() != Some("none")
            && style.visibility.as_deref() != Some("hidden");
        Self {
            tag,
            id,
            classes,
            selector,
            text: truncate_chars(text, TEXT_SNIPPET_LIMIT),
            style,
            geometry,
            visible,
            image,
            index,
        }
    }

    /// A non-empty id, if the element carries one.
    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// `tag#id` when an id is present, else `tag.firstClass`, else `tag`.
pub fn derive_selector(tag: &str, id: Option<&str>, classes: &[String]) -> String {
    if let Some(id) = id.filter(|v| !v.is_empty()) {
        return format!("{tag}#{id}");
    }
    match classes.iter().find(|c| !c.is_empty()) {
        Some(class) => format!("{tag}.{class}"),
        None => tag.to_string(),
    }
}

pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// A failed network request observed during a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkFailure {
    pub url: String,
    #[serde(default)]
    pub failure: String,
}

/// Runtime diagnostics collected while the page was loading and settling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    #[serde(default)]
    pub runtime_errors: Vec<String>,
    #[serde(default)]
    pub console_errors: Vec<String>,
    #[serde(default)]
    pub network_failures: Vec<NetworkFailure>,
}

/// Element counts across the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DomSummary {
    pub elements: u32,
    pub forms: u32,
    pub buttons: u32,
    pub inputs: u32,
    pub images: u32,
}

/// One rendered-page sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCapture {
    pub url: String,
    pub delay_ms: u64,
    pub viewport: Viewport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub diagnostics: Diagnostics,
    pub summary: DomSummary,
    #[serde(default)]
    pub elements: Vec<ElementDescriptor>,
    pub screenshot_path: PathBuf,
    #[serde(default)]
    pub body_html: String,
    #[serde(default)]
    pub full_html: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(w: f32, h: f32) -> ElementBox {
        ElementBox {
            x: 0.0,
            y: 0.0,
            width: w,
            height: h,
        }
    }

    #[test]
    fn selector_prefers_id_then_first_class() {
        assert_eq!(
            derive_selector("button", Some("buy-now"), &["btn".into()]),
            "button#buy-now"
        );
        assert_eq!(
            derive_selector("a", None, &["btn".into(), "primary".into()]),
            "a.btn"
        );
        assert_eq!(derive_selector("h1", Some(""), &[]), "h1");
    }

    #[test]
    fn descriptor_derives_visibility_and_snippet() {
        let long_text = "x".repeat(80);
        let hidden = ElementDescriptor::new(
            "DIV",
            None,
            vec!["cart".into()],
            &long_text,
            StyleSubset {
                visibility: Some("hidden".into()),
                ..StyleSubset::default()
            },
            boxed(40.0, 40.0),
            ImageState::default(),
            3,
        );
        assert_eq!(hidden.tag, "div");
        assert_eq!(hidden.selector, "div.cart");
        assert_eq!(hidden.text.chars().count(), TEXT_SNIPPET_LIMIT);
        assert!(!hidden.visible);

        let shown = ElementDescriptor::new(
            "div",
            Some(String::new()),
            vec![],
            "hi",
            StyleSubset::default(),
            boxed(40.0, 40.0),
            ImageState::default(),
            0,
        );
        assert!(shown.visible);
        assert!(shown.identity().is_none());
    }

    #[test]
    fn threshold_requires_both_edges_above_ten() {
        assert!(boxed(11.0, 11.0).exceeds_threshold());
        assert!(!boxed(10.0, 200.0).exceeds_threshold());
        assert!(!boxed(200.0, 10.0).exceeds_threshold());
    }

    #[test]
    fn truncate_chars_respects_multibyte_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
