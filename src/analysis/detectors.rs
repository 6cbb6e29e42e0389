//! Static HTML detectors: jQuery listeners, inline handlers, trackers and
//! CSS frameworks.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{GuardError, Result};

/// Selector-capturing listener patterns, checked in order.
const JQUERY_PATTERNS: &[&str] = &[
    r#"\$\(['"](\.[\w\-]+)['"]?\)\.on\("#,
    r#"\$\(['"](#[\w\-]+)['"]?\)\.on\("#,
    r#"\$\(['"](\.[\w\-]+)['"]?\)\.click\("#,
    r#"\$\(['"](#[\w\-]+)['"]?\)\.click\("#,
    r#"jQuery\(['"](\.[\w\-]+)['"]?\)\.on\("#,
    r"\$\(document\)\.on\(",
    r"\$\(window\)\.on\(",
];

const INLINE_EVENTS: &[&str] = &[
    "onclick",
    "onload",
    "onchange",
    "onerror",
    "onsubmit",
    "onblur",
    "onfocus",
    "onmouseover",
    "onmouseout",
];

const TRACKERS: &[(&str, &str)] = &[
    ("Google Analytics", r"google.*analytics|gtag|_gaq"),
    ("Google Tag Manager", r"googletagmanager|gtm\.js"),
    ("Facebook Pixel", r"facebook\.com.*pixel|fbq"),
    ("Hotjar", r"hj\.hotjar|hotjar\.com"),
    ("Mixpanel", r"mixpanel\.com|mixpanel\.push"),
    ("Segment", r"segment\.com|analytics\.js"),
    ("Intercom", r"intercom|intercomSettings"),
    ("Drift", r"drift\.com|driftApi"),
];

/// (name, pattern, unused rules can be stripped)
const FRAMEWORKS: &[(&str, &str, bool)] = &[
    ("Bootstrap", r"bootstrap", true),
    ("Tailwind CSS", r"tailwind", true),
    ("Font Awesome", r"font-?awesome", true),
    ("Normalize/Reset CSS", r"(normalize|reset)\.css", false),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineEvent {
    pub event: String,
    pub handler: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Framework {
    pub name: String,
    pub can_remove_unused: bool,
}

struct NamedPattern {
    name: &'static str,
    pattern: Regex,
}

/// Compiled detector patterns; build once and share.
pub struct PageDetectors {
    jquery: Vec<Regex>,
    inline_events: Vec<(&'static str, Regex)>,
    script_element: Regex,
    trackers: Vec<NamedPattern>,
    frameworks: Vec<(NamedPattern, bool)>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| GuardError::Config(format!("detector pattern {pattern}: {e}")))
}

impl PageDetectors {
    pub fn new() -> Result<Self> {
        Ok(Self {
            jquery: JQUERY_PATTERNS
                .iter()
                .map(|p| compile(p))
                .collect::<Result<_>>()?,
            inline_events: INLINE_EVENTS
                .iter()
                .map(|event| Ok((*event, compile(&format!(r#"{event}=["']([^"']+)["']"#))?)))
                .collect::<Result<_>>()?,
            script_element: compile(r"(?is)<script[^>]*>.*?</script>")?,
            trackers: TRACKERS
                .iter()
                .map(|&(name, p)| {
                    Ok(NamedPattern {
                        name,
                        pattern: compile(&format!("(?i){p}"))?,
                    })
                })
                .collect::<Result<_>>()?,
            frameworks: FRAMEWORKS
                .iter()
                .map(|&(name, p, removable)| {
                    Ok((
                        NamedPattern {
                            name,
                            pattern: compile(&format!("(?i){p}"))?,
                        },
                        removable,
                    ))
                })
                .collect::<Result<_>>()?,
        })
    }

    /// Distinct listener targets in first-seen order. Patterns without a
    /// selector report the whole match, e.g. `$(document).on(`.
    pub fn jquery_listeners(&self, html: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for pattern in &self.jquery {
            for caps in pattern.captures_iter(html) {
                let target = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str());
                if let Some(target) = target {
                    if !found.iter().any(|f| f == target) {
                        found.push(target.to_string());
                    }
                }
            }
        }
        found
    }

    /// Every inline handler, grouped by event name.
    pub fn inline_events(&self, html: &str) -> Vec<InlineEvent> {
        self.inline_events
            .iter()
            .flat_map(|(event, pattern)| {
                pattern.captures_iter(html).map(move |caps| InlineEvent {
                    event: event.to_string(),
                    handler: caps[1].to_string(),
                })
            })
            .collect()
    }

    /// Tracker names whose pattern matches any `<script>` element.
    pub fn tracking_scripts(&self, html: &str) -> Vec<&'static str> {
        let scripts: Vec<&str> = self
            .script_element
            .find_iter(html)
            .map(|m| m.as_str())
            .collect();
        self.trackers
            .iter()
            .filter(|t| scripts.iter().any(|s| t.pattern.is_match(s)))
            .map(|t| t.name)
            .collect()
    }

    pub fn frameworks(&self, html: &str) -> Vec<Framework> {
        self.frameworks
            .iter()
            .filter(|(fw, _)| fw.pattern.is_match(html))
            .map(|(fw, removable)| Framework {
                name: fw.name.to_string(),
                can_remove_unused: *removable,
            })
            .collect()
    }
}
