//! Static optimization-risk analysis of a single page.
//!
//! [`PageAnalyzer`] scans page HTML for constructs that page optimizers tend
//! to break (jQuery listeners, inline handlers, custom scripts), for
//! trackers that can be deferred and for CSS frameworks that can be
//! trimmed. The findings are bucketed by risk and scored by
//! [`calculate_risk`].

mod detectors;
mod risk;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::scripts::{PatternScriptClassifier, ScriptRisk, ScriptRiskClassifier};
use crate::{GuardError, Result};

pub use detectors::{Framework, InlineEvent, PageDetectors};
pub use risk::{calculate_risk, RiskLevel, RiskRecommendation, Strategy};

/// Characters of page HTML kept with a stored analysis.
pub const RAW_HTML_LIMIT: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisIssueKind {
    JqueryListener,
    InlineEvent,
    CustomScript,
    TrackingScript,
    SafeFramework,
}

/// What an optimizer should do about an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationAction {
    SkipCssRemoval,
    SkipHtmlChanges,
    SkipMinify,
    DeferOk,
    Optimize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisIssue {
    #[serde(rename = "type")]
    pub kind: AnalysisIssueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    pub reason: String,
    pub action: OptimizationAction,
}

impl AnalysisIssue {
    /// An issue with the reason and action every issue of `kind` carries.
    pub fn new(kind: AnalysisIssueKind) -> Self {
        let (reason, action) = match kind {
            AnalysisIssueKind::JqueryListener => (
                "CSS removal may break event targeting",
                OptimizationAction::SkipCssRemoval,
            ),
            AnalysisIssueKind::InlineEvent => (
                "HTML structure changes break handlers",
                OptimizationAction::SkipHtmlChanges,
            ),
            AnalysisIssueKind::CustomScript => (
                "May break if minified incorrectly",
                OptimizationAction::SkipMinify,
            ),
            AnalysisIssueKind::TrackingScript => {
                ("Can be safely deferred", OptimizationAction::DeferOk)
            }
            AnalysisIssueKind::SafeFramework => {
                ("Can be aggressively optimized", OptimizationAction::Optimize)
            }
        };
        Self {
            kind,
            description: None,
            selectors: Vec::new(),
            items: Vec::new(),
            reason: reason.to_string(),
            action,
        }
    }

    fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisIssues {
    pub high_risk: Vec<AnalysisIssue>,
    pub medium_risk: Vec<AnalysisIssue>,
    pub low_risk: Vec<AnalysisIssue>,
    pub safe: Vec<AnalysisIssue>,
}

impl AnalysisIssues {
    pub fn counts(&self) -> IssueCounts {
        IssueCounts {
            high_risk: self.high_risk.len(),
            medium_risk: self.medium_risk.len(),
            low_risk: self.low_risk.len(),
            safe: self.safe.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCounts {
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub safe: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    /// Sizes count characters, not bytes.
    pub html_size: usize,
    pub script_count: usize,
    pub css_count: usize,
    /// Leading [`RAW_HTML_LIMIT`] characters of the page.
    pub raw_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStats {
    pub total_scripts: usize,
    pub total_css: usize,
    pub total_html_size: usize,
    #[serde(rename = "hasJQuery")]
    pub has_jquery: bool,
    pub has_react: bool,
    pub has_vue: bool,
    pub tracking_scripts: usize,
}

/// The stored result of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub site_id: String,
    pub page_url: String,
    pub created_at: DateTime<Utc>,
    pub page_data: PageData,
    pub issues: AnalysisIssues,
    pub risk_score: f64,
    pub recommendation: RiskRecommendation,
    pub stats: PageStats,
}

struct PageMarkers {
    script_open: Regex,
    stylesheet: Regex,
    jquery: Regex,
    react: Regex,
    vue: Regex,
}

impl PageMarkers {
    fn new() -> Result<Self> {
        let compile = |p: &str| {
            Regex::new(p).map_err(|e| GuardError::Config(format!("page marker {p}: {e}")))
        };
        Ok(Self {
            script_open: compile(r"<script")?,
            stylesheet: compile(r"<link.*css|<style")?,
            jquery: compile(r"(?i)jquery|\$\(")?,
            react: compile(r"(?i)react|ReactDOM")?,
            vue: compile(r"(?i)vue")?,
        })
    }
}

pub struct PageAnalyzer {
    detectors: PageDetectors,
    scripts: Box<dyn ScriptRiskClassifier>,
    markers: PageMarkers,
}

impl PageAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            detectors: PageDetectors::new()?,
            scripts: Box::new(PatternScriptClassifier::new()?),
            markers: PageMarkers::new()?,
        })
    }

    /// Replaces the classifier behind custom-script detection.
    pub fn with_script_classifier(mut self, classifier: Box<dyn ScriptRiskClassifier>) -> Self {
        self.scripts = classifier;
        self
    }

    pub fn analyze(&self, site_id: &str, page_url: &str, html: &str) -> Result<PageAnalysis> {
        if site_id.trim().is_empty() || page_url.trim().is_empty() || html.is_empty() {
            return Err(GuardError::InvalidRequest(
                "Missing required fields".to_string(),
            ));
        }
        info!(site_id, page_url, "analyzing page");

        let issues = self.collect_issues(html);
        let recommendation = calculate_risk(&issues);
        debug!(
            counts = ?issues.counts(),
            score = recommendation.risk_score,
            "page analysis scored"
        );

        let html_size = html.chars().count();
        let script_count = self.markers.script_open.find_iter(html).count();
        let css_count = self.markers.stylesheet.find_iter(html).count();
        let tracking_scripts = issues.low_risk.len();

        Ok(PageAnalysis {
            id: None,
            site_id: site_id.to_string(),
            page_url: page_url.to_string(),
            created_at: Utc::now(),
            page_data: PageData {
                html_size,
                script_count,
                css_count,
                raw_html: html.chars().take(RAW_HTML_LIMIT).collect(),
            },
            risk_score: recommendation.risk_score,
            recommendation,
            stats: PageStats {
                total_scripts: script_count,
                total_css: css_count,
                total_html_size: html_size,
                has_jquery: self.markers.jquery.is_match(html),
                has_react: self.markers.react.is_match(html),
                has_vue: self.markers.vue.is_match(html),
                tracking_scripts,
            },
            issues,
        })
    }

    fn collect_issues(&self, html: &str) -> AnalysisIssues {
        let d = &self.detectors;

        let mut high_risk: Vec<AnalysisIssue> = d
            .jquery_listeners(html)
            .into_iter()
            .map(|selector| AnalysisIssue {
                selectors: vec![selector],
                ..AnalysisIssue::new(AnalysisIssueKind::JqueryListener)
                    .described("jQuery event listener")
            })
            .collect();
        high_risk.extend(d.inline_events(html).into_iter().map(|evt| {
            AnalysisIssue::new(AnalysisIssueKind::InlineEvent)
                .described(format!("Inline event handler: {}", evt.event))
        }));

        let medium_risk = self
            .scripts
            .classify(html)
            .into_iter()
            .filter(|s| s.risk == ScriptRisk::Medium)
            .map(|_| {
                AnalysisIssue::new(AnalysisIssueKind::CustomScript)
                    .described("Custom script detected")
            })
            .collect();

        let low_risk = d
            .tracking_scripts(html)
            .into_iter()
            .map(|name| AnalysisIssue::new(AnalysisIssueKind::TrackingScript).described(name))
            .collect();

        let safe = d
            .frameworks(html)
            .into_iter()
            .map(|fw| AnalysisIssue {
                reason: format!("{} can be aggressively optimized", fw.name),
                items: vec![fw.name],
                ..AnalysisIssue::new(AnalysisIssueKind::SafeFramework)
            })
            .collect();

        AnalysisIssues {
            high_risk,
            medium_risk,
            low_risk,
            safe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripts::{ScriptFinding, ScriptKind};

    const LEGACY_SHOP: &str = r#"<html><head>
<link rel="stylesheet" href="https://maxcdn.bootstrapcdn.com/bootstrap.min.css">
<script src="https://code.jquery.com/jquery.min.js"></script>
<script src="/js/cart.js"></script>
<script async src="https://www.googletagmanager.com/gtm.js?id=GTM-1"></script>
</head><body>
<button id="buy" onclick="addToCart(1)">Buy</button>
<script>$('#buy').click(track); window.cart = [];</script>
</body></html>"#;

    fn analyzer() -> PageAnalyzer {
        PageAnalyzer::new().unwrap()
    }

    #[test]
    fn legacy_page_issues_are_bucketed_by_risk() {
        let analysis = analyzer().analyze("shop", "https://shop.test/", LEGACY_SHOP).unwrap();
        let issues = &analysis.issues;

        assert_eq!(issues.high_risk.len(), 2);
        assert_eq!(issues.high_risk[0].kind, AnalysisIssueKind::JqueryListener);
        assert_eq!(issues.high_risk[0].selectors, vec!["#buy"]);
        assert_eq!(
            issues.high_risk[1].description.as_deref(),
            Some("Inline event handler: onclick")
        );
        // /js/cart.js and the inline script touching `window.`
        assert_eq!(issues.medium_risk.len(), 2);
        assert!(issues
            .medium_risk
            .iter()
            .all(|i| i.action == OptimizationAction::SkipMinify));
        assert_eq!(issues.low_risk.len(), 1);
        assert_eq!(
            issues.low_risk[0].description.as_deref(),
            Some("Google Tag Manager")
        );
        assert_eq!(issues.safe.len(), 1);
        assert_eq!(issues.safe[0].items, vec!["Bootstrap"]);
        assert_eq!(issues.safe[0].reason, "Bootstrap can be aggressively optimized");

        // 2 * 1.0 + 2 * 0.5 + 0.2 = 3.2
        assert_eq!(analysis.risk_score, 0.32);
        assert_eq!(analysis.recommendation.level, RiskLevel::LowRisk);
    }

    #[test]
    fn stats_describe_the_page() {
        let analysis = analyzer().analyze("shop", "https://shop.test/", LEGACY_SHOP).unwrap();
        assert_eq!(analysis.stats.total_scripts, 4);
        assert_eq!(analysis.stats.total_css, 1);
        assert!(analysis.stats.has_jquery);
        assert!(!analysis.stats.has_react);
        assert!(!analysis.stats.has_vue);
        assert_eq!(analysis.stats.tracking_scripts, 1);
        assert_eq!(analysis.page_data.html_size, LEGACY_SHOP.chars().count());
        assert_eq!(analysis.page_data.raw_html, LEGACY_SHOP);
    }

    #[test]
    fn raw_html_is_truncated_on_char_boundaries() {
        let html = format!("<p>{}</p>", "é".repeat(RAW_HTML_LIMIT));
        let analysis = analyzer().analyze("s", "https://s.test/", &html).unwrap();
        assert_eq!(analysis.page_data.raw_html.chars().count(), RAW_HTML_LIMIT);
        assert_eq!(analysis.page_data.html_size, RAW_HTML_LIMIT + 7);
    }

    #[test]
    fn missing_inputs_are_rejected() {
        for (site, url, html) in [("", "https://a.test/", "<p>"), ("s", " ", "<p>"), ("s", "u", "")] {
            let err = analyzer().analyze(site, url, html).unwrap_err();
            assert!(matches!(err, GuardError::InvalidRequest(ref m) if m == "Missing required fields"));
        }
    }

    struct HighOnly;

    impl ScriptRiskClassifier for HighOnly {
        fn classify(&self, _html: &str) -> Vec<ScriptFinding> {
            vec![ScriptFinding {
                kind: ScriptKind::Inline,
                risk: ScriptRisk::High,
                src: None,
            }]
        }
    }

    #[test]
    fn only_medium_scripts_count_as_custom() {
        let analysis = analyzer()
            .with_script_classifier(Box::new(HighOnly))
            .analyze("s", "https://s.test/", "<p>static</p>")
            .unwrap();
        assert!(analysis.issues.medium_risk.is_empty());
        assert_eq!(analysis.recommendation.strategy, Strategy::Aggressive);
    }

    #[test]
    fn issue_wire_shape_omits_empty_fields() {
        let analysis = analyzer().analyze("shop", "https://shop.test/", LEGACY_SHOP).unwrap();
        let json = serde_json::to_value(&analysis).unwrap();
        let high = &json["issues"]["highRisk"][0];
        assert_eq!(high["type"], "jquery_listener");
        assert_eq!(high["action"], "SKIP_CSS_REMOVAL");
        assert!(json["issues"]["highRisk"][1].get("selectors").is_none());
        assert!(json["issues"]["safe"][0].get("description").is_none());
        assert_eq!(json["stats"]["hasJQuery"], true);
        assert!(json.get("id").is_none());
    }
}
