use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisIssues, IssueCounts, PageAnalysis, RiskLevel, Strategy};
use crate::compare::engine::FailedStatus;
use crate::error::ErrorPayload;
use crate::storage::{ReportListing, ReportPage};
use crate::types::ComparisonReport;

/// Schema version for output payloads.
pub const PAGEGUARD_OUTPUT_VERSION: &str = "0.1.0";

/// Everything the CLI prints, tagged by `mode`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum GuardOutput {
    Compare(CompareOutput),
    History(HistoryOutput),
    Report(ReportOutput),
    Latest(LatestOutput),
    Analyze(AnalyzeOutput),
    Analysis(AnalysisOutput),
    Analyses(AnalysesOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareOutput {
    pub version: String,
    #[serde(flatten)]
    pub report: ComparisonReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryOutput {
    pub version: String,
    #[serde(flatten)]
    pub page: ReportPage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutput {
    pub version: String,
    #[serde(flatten)]
    pub report: ComparisonReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestOutput {
    pub version: String,
    #[serde(flatten)]
    pub latest: ReportListing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzedStatus {
    Analyzed,
}

/// Verdict of a fresh analysis. Raw HTML is left out; fetch it with the
/// `analysis` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOutput {
    pub version: String,
    pub status: AnalyzedStatus,
    /// `None` when the analysis was not stored.
    pub analysis_id: Option<String>,
    pub site_id: String,
    pub page_url: String,
    pub risk_score: f64,
    pub recommendation: RiskLevel,
    pub strategy: Strategy,
    pub tip: String,
    pub issues_summary: IssueCounts,
    pub issues: AnalysisIssues,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutput {
    pub version: String,
    #[serde(flatten)]
    pub analysis: PageAnalysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysesOutput {
    pub version: String,
    pub site_id: String,
    pub results: Vec<PageAnalysis>,
}

/// `{status: "failed", error}` plus a categorized payload with a remediation hint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    pub status: FailedStatus,
    pub error: String,
    pub details: ErrorPayload,
}

impl GuardOutput {
    pub fn compare(report: ComparisonReport) -> Self {
        GuardOutput::Compare(CompareOutput {
            version: PAGEGUARD_OUTPUT_VERSION.to_string(),
            report,
        })
    }

    pub fn history(page: ReportPage) -> Self {
        GuardOutput::History(HistoryOutput {
            version: PAGEGUARD_OUTPUT_VERSION.to_string(),
            page,
        })
    }

    pub fn report(report: ComparisonReport) -> Self {
        GuardOutput::Report(ReportOutput {
            version: PAGEGUARD_OUTPUT_VERSION.to_string(),
            report,
        })
    }

    pub fn latest(latest: ReportListing) -> Self {
        GuardOutput::Latest(LatestOutput {
            version: PAGEGUARD_OUTPUT_VERSION.to_string(),
            latest,
        })
    }

    pub fn analyze(analysis: PageAnalysis) -> Self {
        GuardOutput::Analyze(AnalyzeOutput {
            version: PAGEGUARD_OUTPUT_VERSION.to_string(),
            status: AnalyzedStatus::Analyzed,
            issues_summary: analysis.issues.counts(),
            risk_score: analysis.risk_score,
            recommendation: analysis.recommendation.level,
            strategy: analysis.recommendation.strategy,
            tip: analysis.recommendation.tip,
            analysis_id: analysis.id,
            site_id: analysis.site_id,
            page_url: analysis.page_url,
            issues: analysis.issues,
        })
    }

    pub fn analysis(analysis: PageAnalysis) -> Self {
        GuardOutput::Analysis(AnalysisOutput {
            version: PAGEGUARD_OUTPUT_VERSION.to_string(),
            analysis,
        })
    }

    pub fn analyses(site_id: impl Into<String>, results: Vec<PageAnalysis>) -> Self {
        GuardOutput::Analyses(AnalysesOutput {
            version: PAGEGUARD_OUTPUT_VERSION.to_string(),
            site_id: site_id.into(),
            results,
        })
    }

    pub fn error(err: &crate::GuardError) -> Self {
        GuardOutput::Error(ErrorOutput {
            version: PAGEGUARD_OUTPUT_VERSION.to_string(),
            status: FailedStatus::Failed,
            error: err.caller_message(),
            details: err.to_payload(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PageAnalyzer;
    use crate::types::{Recommendation, ReportSeverity, ReportStatus};
    use crate::GuardError;
    use chrono::Utc;

    fn listing() -> ReportListing {
        ReportListing {
            id: "r1".into(),
            site_id: "site-1".into(),
            before_url: "https://a.example".into(),
            after_url: "https://b.example".into(),
            status: ReportStatus::Warning,
            recommendation: Recommendation::DeployWithCaution,
            severity: ReportSeverity::Warning,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn history_output_flattens_page() {
        let output = GuardOutput::history(ReportPage {
            results: vec![listing()],
            total: 7,
            limit: 50,
            skip: 0,
        });
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["mode"], "history");
        assert_eq!(json["total"], 7);
        assert_eq!(json["results"][0]["recommendation"], "DEPLOY_WITH_CAUTION");
        assert_eq!(json["version"], PAGEGUARD_OUTPUT_VERSION);
    }

    #[test]
    fn latest_output_serializes_listing_fields() {
        let json = serde_json::to_value(GuardOutput::latest(listing())).unwrap();
        assert_eq!(json["mode"], "latest");
        assert_eq!(json["siteId"], "site-1");
        assert_eq!(json["status"], "WARNING");
    }

    #[test]
    fn error_output_carries_failed_status_and_caller_message() {
        let err = GuardError::invalid_request("Missing: beforeUrl, afterUrl, siteId");
        let json = serde_json::to_value(GuardOutput::error(&err)).unwrap();
        assert_eq!(json["mode"], "error");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "Missing: beforeUrl, afterUrl, siteId");
        assert_eq!(json["details"]["category"], "request");
        assert!(json["details"]["remediation"].is_string());
    }

    #[test]
    fn analyze_output_summarizes_buckets() {
        let mut analysis = PageAnalyzer::new()
            .unwrap()
            .analyze(
                "shop",
                "https://shop.example/",
                r#"<button onclick="buy()">Buy</button><script src="/app.js"></script>"#,
            )
            .unwrap();
        analysis.id = Some("a-1".into());

        let json = serde_json::to_value(GuardOutput::analyze(analysis)).unwrap();
        assert_eq!(json["mode"], "analyze");
        assert_eq!(json["status"], "analyzed");
        assert_eq!(json["analysisId"], "a-1");
        assert_eq!(json["recommendation"], "LOW_RISK");
        assert_eq!(json["strategy"], "aggressive");
        assert_eq!(json["issuesSummary"]["highRisk"], 1);
        assert_eq!(json["issuesSummary"]["mediumRisk"], 1);
        assert_eq!(json["riskScore"], 0.15);
        assert!(json.get("pageData").is_none());
    }
}
