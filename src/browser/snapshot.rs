//! Raw renderer output and its conversion into [`SnapshotCapture`].
//!
//! Both the Playwright helper and on-disk fixtures emit this raw shape. The
//! element inclusion filter, selector derivation and text/HTML truncation are
//! all applied here rather than trusted from the producer.

use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

use super::renderer::CaptureRequest;
use crate::types::{
    truncate_chars, Diagnostics, DomSummary, ElementBox, ElementDescriptor, ImageState,
    NetworkFailure, SnapshotCapture, StyleSubset, BODY_HTML_LIMIT,
};

/// Envelope printed by the Playwright helper on stdout.
#[derive(Debug, Deserialize)]
pub(crate) struct ScriptEnvelope {
    pub status: String,
    pub message: Option<String>,
    pub capture: Option<RawCapture>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCapture {
    pub title: Option<String>,
    #[serde(default)]
    pub body_html: String,
    #[serde(default)]
    pub full_html: String,
    #[serde(default)]
    pub counts: RawCounts,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub console_errors: Vec<String>,
    #[serde(default)]
    pub network_errors: Vec<RawNetworkFailure>,
    #[serde(default)]
    pub elements: Vec<RawElement>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawCounts {
    #[serde(default)]
    pub elements: u32,
    #[serde(default)]
    pub forms: u32,
    #[serde(default)]
    pub buttons: u32,
    #[serde(default)]
    pub inputs: u32,
    #[serde(default)]
    pub images: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawNetworkFailure {
    pub url: String,
    pub failure: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawElement {
    pub tag: String,
    pub id: Option<String>,
    pub class: Option<String>,
    #[serde(default)]
    pub text: String,
    pub display: Option<String>,
    pub visibility: Option<String>,
    pub opacity: Option<String>,
    pub font_size: Option<String>,
    pub color: Option<String>,
    pub background_color: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub rect_width: f32,
    #[serde(default)]
    pub rect_height: f32,
    #[serde(default)]
    pub is_img: bool,
    pub img_src: Option<String>,
    pub img_loaded: Option<bool>,
    pub index: Option<usize>,
}

impl RawElement {
    fn into_descriptor(self, position: usize) -> Option<ElementDescriptor> {
        let geometry = ElementBox {
            x: self.x,
            y: self.y,
            width: self.rect_width,
            height: self.rect_height,
        };
        if !geometry.exceeds_threshold() {
            return None;
        }

        let classes = self
            .class
            .as_deref()
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let style = StyleSubset {
            display: self.display,
            visibility: self.visibility,
            opacity: self.opacity,
            font_size: self.font_size,
            color: self.color,
            background_color: self.background_color,
            width: self.width,
            height: self.height,
        };
        let image = ImageState {
            is_image: self.is_img,
            source: self.img_src,
            loaded: self.img_loaded,
        };

        Some(ElementDescriptor::new(
            self.tag,
            self.id,
            classes,
            &self.text,
            style,
            geometry,
            image,
            self.index.unwrap_or(position),
        ))
    }
}

/// Converts raw renderer output into an immutable snapshot for `request`.
pub(crate) fn into_snapshot(
    raw: RawCapture,
    request: &CaptureRequest,
    html_limit: Option<usize>,
    elapsed: Duration,
) -> SnapshotCapture {
    let elements: Vec<ElementDescriptor> = raw
        .elements
        .into_iter()
        .enumerate()
        .filter_map(|(position, el)| el.into_descriptor(position))
        .collect();

    let full_html = match html_limit {
        Some(limit) => truncate_chars(&raw.full_html, limit),
        None => raw.full_html,
    };

    SnapshotCapture {
        url: request.url.clone(),
        delay_ms: request.delay_ms,
        viewport: request.viewport,
        title: raw.title.filter(|t| !t.is_empty()),
        diagnostics: Diagnostics {
            runtime_errors: raw.errors,
            console_errors: raw.console_errors,
            network_failures: raw
                .network_errors
                .into_iter()
                .map(|n| NetworkFailure {
                    url: n.url,
                    failure: n.failure.unwrap_or_default(),
                })
                .collect(),
        },
        summary: DomSummary {
            elements: raw.counts.elements,
            forms: raw.counts.forms,
            buttons: raw.counts.buttons,
            inputs: raw.counts.inputs,
            images: raw.counts.images,
        },
        elements,
        screenshot_path: request.screenshot_path.clone(),
        body_html: truncate_chars(&raw.body_html, BODY_HTML_LIMIT),
        full_html,
        captured_at: Utc::now(),
        elapsed_ms: elapsed.as_millis() as u64,
    }
}
