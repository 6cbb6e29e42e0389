//! Script risk detection over captured page HTML.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{GuardError, Result};

const CDN_PATTERNS: &[&str] = &[
    r"cdn\.",
    r"jsdelivr\.net",
    r"cloudflare\.com",
    r"unpkg\.com",
    r"code\.jquery\.com",
    r"maxcdn\.bootstrapcdn\.com",
    r"googleapis\.com",
    r"ajax\.microsoft\.com",
];

/// Substrings that exempt an external script from reporting.
const TRUSTED_SOURCE_MARKERS: &[&str] = &["google", "facebook"];

const GLOBAL_ACCESS_MARKERS: &[&str] = &["window.", "document.", "localStorage", "sessionStorage"];

const DYNAMIC_CODE_MARKERS: &[&str] = &["eval(", "document.write(", "new Function("];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    External,
    Inline,
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ScriptKind::External => "external",
            ScriptKind::Inline => "inline",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptRisk {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFinding {
    #[serde(rename = "type")]
    pub kind: ScriptKind,
    pub risk: ScriptRisk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

/// Flags scripts in a page's HTML that may interfere with the page.
pub trait ScriptRiskClassifier: Send + Sync {
    fn classify(&self, html: &str) -> Vec<ScriptFinding>;
}

/// Regex-driven classifier.
///
/// External scripts are reported unless served from a known CDN or a
/// trusted first-party source; inline scripts are reported when their body
/// touches page globals, at high risk when it generates code dynamically.
#[derive(Debug, Clone)]
pub struct PatternScriptClassifier {
    open_tag: Regex,
    src_attr: Regex,
    element: Regex,
    cdns: Vec<Regex>,
}

impl PatternScriptClassifier {
    pub fn new() -> Result<Self> {
        let compile =
            |p: &str| Regex::new(p).map_err(|e| GuardError::Config(format!("script pattern {p}: {e}")));
        Ok(Self {
            open_tag: compile(r"(?i)<script\b([^>]*)>")?,
            src_attr: compile(r#"(?i)\bsrc\s*=\s*["']([^"']+)["']"#)?,
            element: compile(r"(?is)<script\b[^>]*>(.*?)</script\s*>")?,
            cdns: CDN_PATTERNS
                .iter()
                .map(|p| compile(p))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    fn is_cdn(&self, src: &str) -> bool {
        self.cdns.iter().any(|re| re.is_match(src))
    }
}

impl ScriptRiskClassifier for PatternScriptClassifier {
    fn classify(&self, html: &str) -> Vec<ScriptFinding> {
        let mut findings = Vec::new();

        for tag in self.open_tag.captures_iter(html) {
            let Some(src) = self.src_attr.captures(&tag[1]).map(|c| c[1].to_string()) else {
                continue;
            };
            let trusted = TRUSTED_SOURCE_MARKERS.iter().any(|m| src.contains(m));
            if !self.is_cdn(&src) && !trusted {
                findings.push(ScriptFinding {
                    kind: ScriptKind::External,
                    risk: ScriptRisk::Medium,
                    src: Some(src),
                });
            }
        }

        for element in self.element.captures_iter(html) {
            let body = &element[1];
            if DYNAMIC_CODE_MARKERS.iter().any(|m| body.contains(m)) {
                findings.push(ScriptFinding {
                    kind: ScriptKind::Inline,
                    risk: ScriptRisk::High,
                    src: None,
                });
            } else if GLOBAL_ACCESS_MARKERS.iter().any(|m| body.contains(m)) {
                findings.push(ScriptFinding {
                    kind: ScriptKind::Inline,
                    risk: ScriptRisk::Medium,
                    src: None,
                });
            }
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(html: &str) -> Vec<ScriptFinding> {
        PatternScriptClassifier::new().unwrap().classify(html)
    }

    #[test]
    fn cdn_and_trusted_sources_are_ignored() {
        let html = r#"
            <script src="https://cdn.jsdelivr.net/npm/vue"></script>
            <script src="https://code.jquery.com/jquery.min.js"></script>
            <script src="https://www.googletagmanager.com/gtag/js"></script>
            <script src='https://connect.facebook.net/sdk.js'></script>
        "#;
        assert!(classify(html).is_empty());
    }

    #[test]
    fn first_party_external_script_is_medium() {
        let findings = classify(r#"<SCRIPT type="module" src="/assets/optimizer.js"></SCRIPT>"#);
        assert_eq!(
            findings,
            vec![ScriptFinding {
                kind: ScriptKind::External,
                risk: ScriptRisk::Medium,
                src: Some("/assets/optimizer.js".into()),
            }]
        );
    }

    #[test]
    fn inline_scripts_are_graded_by_body() {
        let html = r#"
            <script>var x = 1;</script>
            <script>
              localStorage.setItem('seen', '1');
            </script>
            <script>eval(atob(payload));</script>
        "#;
        let findings = classify(html);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].risk, ScriptRisk::Medium);
        assert_eq!(findings[1].risk, ScriptRisk::High);
        assert!(findings.iter().all(|f| f.kind == ScriptKind::Inline));
        assert!(findings.iter().all(|f| f.src.is_none()));
    }

    #[test]
    fn finding_serializes_with_wire_names() {
        let json = serde_json::to_value(ScriptFinding {
            kind: ScriptKind::External,
            risk: ScriptRisk::High,
            src: None,
        })
        .unwrap();
        assert_eq!(json["type"], "external");
        assert_eq!(json["risk"], "HIGH");
    }
}
