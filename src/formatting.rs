use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pageguard_lib::analysis::{AnalysisIssue, IssueCounts, PageAnalysis, RiskLevel};
use pageguard_lib::types::{ComparisonReport, Recommendation, ReportStatus};
use pageguard_lib::{GuardError, GuardOutput};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &GuardOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: GuardError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    tracing::error!(error = %err, "command failed");
    let payload = GuardOutput::error(&err);

    match format {
        OutputFormat::Json => {
            let content = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"mode\":\"error\",\"status\":\"failed\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    // Exit code 2 is reserved for fatal errors; a blocking verdict uses 1.
    ExitCode::from(2)
}

/// Write JSON output to file or stdout.
fn write_json_output(
    body: &GuardOutput,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Write pretty output to file or stdout.
fn write_pretty_output(body: &GuardOutput, output: Option<&Path>) -> io::Result<()> {
    let stdout_is_tty = std::io::stdout().is_terminal();
    let use_human = output.is_none() && stdout_is_tty;

    if use_human {
        let content = format_pretty(body, true);
        println!("{content}");
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content = serde_json::to_string_pretty(body)
        .unwrap_or_else(|_| "{\"mode\":\"error\",\"status\":\"failed\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn status_color(status: ReportStatus) -> &'static str {
    match status {
        ReportStatus::Safe => "32",
        ReportStatus::Warning => "33",
        ReportStatus::Broken | ReportStatus::Failed => "31",
    }
}

fn recommendation_color(recommendation: Recommendation) -> &'static str {
    match recommendation {
        Recommendation::SafeToDeploy => "32",
        Recommendation::DeployWithCaution | Recommendation::ReviewRequired => "33",
        Recommendation::DoNotDeploy => "31",
    }
}

fn format_report(buf: &mut String, report: &ComparisonReport, colorize: bool) {
    let status = color(report.status.as_str(), status_color(report.status), colorize);
    let recommendation = color(
        report.recommendation.as_str(),
        recommendation_color(report.recommendation),
        colorize,
    );
    writeln!(buf, "{status} {recommendation} ({})", report.site_id).ok();
    if let Some(id) = &report.id {
        writeln!(buf, "Report: {id}").ok();
    }
    writeln!(buf, "Before: {}", report.before_url).ok();
    writeln!(buf, "After:  {}", report.after_url).ok();
    writeln!(
        buf,
        "Visual: {:.2}% changed ({:?})",
        report.visual.percent_changed, report.visual.status
    )
    .ok();

    let d = &report.differences;
    if !d.new_errors.is_empty() || !d.new_console_errors.is_empty() || !d.new_network_errors.is_empty()
    {
        writeln!(
            buf,
            "New errors: {} runtime, {} console, {} network",
            d.new_errors.len(),
            d.new_console_errors.len(),
            d.new_network_errors.len()
        )
        .ok();
    }
    let dom = &d.dom_changes;
    writeln!(
        buf,
        "DOM: elements {:+}, forms {:+}, buttons {:+}, inputs {:+}, images {:+}",
        dom.element_count_diff, dom.forms_diff, dom.buttons_diff, dom.inputs_diff, dom.images_diff
    )
    .ok();

    let summary = &report.issues_summary;
    writeln!(
        buf,
        "Issues: {} (critical {}, high {}, medium {}, low {})",
        summary.total, summary.critical, summary.high, summary.medium, summary.low
    )
    .ok();
    // Cap the list so terminal output stays readable.
    for issue in report.issues.iter().take(10) {
        writeln!(
            buf,
            "- [{}] {} {}: {}",
            issue.severity, issue.issue_type, issue.element, issue.detail
        )
        .ok();
    }
    if report.issues.len() > 10 {
        writeln!(buf, "  ... {} more", report.issues.len() - 10).ok();
    }

    if let Some(path) = &report.overlay_path {
        writeln!(buf, "Overlay: {}", path.display()).ok();
    }
    for degradation in &report.degradations {
        writeln!(
            buf,
            "{} {}: {}",
            color("[DEGRADED]", "33", colorize),
            degradation.stage,
            degradation.reason
        )
        .ok();
    }
}

fn risk_color(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::LowRisk => "32",
        RiskLevel::MediumRisk => "33",
        RiskLevel::HighRisk => "31",
    }
}

fn format_issue_counts(buf: &mut String, counts: &IssueCounts) {
    writeln!(
        buf,
        "Issues: high {}, medium {}, low {}, safe {}",
        counts.high_risk, counts.medium_risk, counts.low_risk, counts.safe
    )
    .ok();
}

fn format_issue_list(buf: &mut String, label: &str, issues: &[AnalysisIssue]) {
    for issue in issues {
        let subject = issue
            .description
            .as_deref()
            .or_else(|| issue.items.first().map(String::as_str))
            .unwrap_or_default();
        let selectors = if issue.selectors.is_empty() {
            String::new()
        } else {
            format!(" {}", issue.selectors.join(", "))
        };
        writeln!(buf, "- [{label}] {subject}{selectors}: {}", issue.reason).ok();
    }
}

fn format_analysis(buf: &mut String, analysis: &PageAnalysis, colorize: bool) {
    let rec = &analysis.recommendation;
    writeln!(
        buf,
        "{} {:.2} {} ({})",
        color(&rec.level.to_string(), risk_color(rec.level), colorize),
        analysis.risk_score,
        rec.strategy,
        analysis.site_id
    )
    .ok();
    if let Some(id) = &analysis.id {
        writeln!(buf, "Analysis: {id}").ok();
    }
    writeln!(buf, "Page: {}", analysis.page_url).ok();
    writeln!(buf, "Tip: {}", rec.tip).ok();
    format_issue_counts(buf, &analysis.issues.counts());
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &GuardOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        GuardOutput::Compare(out) => format_report(&mut buf, &out.report, colorize),
        GuardOutput::Report(out) => format_report(&mut buf, &out.report, colorize),
        GuardOutput::History(out) => {
            let header = color("[HISTORY]", "36", colorize);
            writeln!(
                buf,
                "{} {} of {} reports (skip {})",
                header,
                out.page.results.len(),
                out.page.total,
                out.page.skip
            )
            .ok();
            for row in &out.page.results {
                writeln!(
                    buf,
                    "- {} {} {} {} {}",
                    row.created_at.format("%Y-%m-%d %H:%M:%S"),
                    color(row.status.as_str(), status_color(row.status), colorize),
                    row.recommendation,
                    row.site_id,
                    row.id
                )
                .ok();
            }
        }
        GuardOutput::Latest(out) => {
            let latest = &out.latest;
            writeln!(
                buf,
                "{} {} ({})",
                color(latest.status.as_str(), status_color(latest.status), colorize),
                color(
                    latest.recommendation.as_str(),
                    recommendation_color(latest.recommendation),
                    colorize
                ),
                latest.site_id
            )
            .ok();
            writeln!(buf, "Report: {} at {}", latest.id, latest.created_at.to_rfc3339()).ok();
        }
        GuardOutput::Analyze(out) => {
            writeln!(
                buf,
                "{} {:.2} {} ({})",
                color(
                    &out.recommendation.to_string(),
                    risk_color(out.recommendation),
                    colorize
                ),
                out.risk_score,
                out.strategy,
                out.site_id
            )
            .ok();
            if let Some(id) = &out.analysis_id {
                writeln!(buf, "Analysis: {id}").ok();
            }
            writeln!(buf, "Page: {}", out.page_url).ok();
            writeln!(buf, "Tip: {}", out.tip).ok();
            format_issue_counts(&mut buf, &out.issues_summary);
            format_issue_list(&mut buf, "high", &out.issues.high_risk);
            format_issue_list(&mut buf, "medium", &out.issues.medium_risk);
            format_issue_list(&mut buf, "low", &out.issues.low_risk);
            format_issue_list(&mut buf, "safe", &out.issues.safe);
        }
        GuardOutput::Analysis(out) => format_analysis(&mut buf, &out.analysis, colorize),
        GuardOutput::Analyses(out) => {
            let header = color("[ANALYSES]", "36", colorize);
            writeln!(buf, "{} {} for {}", header, out.results.len(), out.site_id).ok();
            for analysis in &out.results {
                writeln!(
                    buf,
                    "- {} {} {:.2} {} {}",
                    analysis.created_at.format("%Y-%m-%d %H:%M:%S"),
                    analysis.recommendation.level,
                    analysis.risk_score,
                    analysis.page_url,
                    analysis.id.as_deref().unwrap_or("-")
                )
                .ok();
            }
        }
        GuardOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            writeln!(buf, "{} {}", header, out.error).ok();
            if let Some(remediation) = &out.details.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

/// Exit code for a completed comparison: 0 when the change may ship, 1 otherwise.
pub fn exit_code_for_recommendation(recommendation: Recommendation) -> ExitCode {
    if recommendation.allows_deploy() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pageguard_lib::storage::{ReportListing, ReportPage};
    use pageguard_lib::types::ReportSeverity;

    #[test]
    fn exit_code_maps_recommendations() {
        assert_eq!(
            exit_code_for_recommendation(Recommendation::SafeToDeploy),
            ExitCode::SUCCESS
        );
        assert_eq!(
            exit_code_for_recommendation(Recommendation::DeployWithCaution),
            ExitCode::SUCCESS
        );
        assert_eq!(
            exit_code_for_recommendation(Recommendation::DoNotDeploy),
            ExitCode::from(1)
        );
        assert_eq!(
            exit_code_for_recommendation(Recommendation::ReviewRequired),
            ExitCode::from(1)
        );
    }

    #[test]
    fn render_error_always_returns_fatal_exit_code() {
        let code = render_error(
            GuardError::Config("boom".to_string()),
            OutputFormat::Json,
            None,
        );
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn format_pretty_lists_history_rows() {
        let output = GuardOutput::history(ReportPage {
            results: vec![ReportListing {
                id: "r-1".into(),
                site_id: "shop".into(),
                before_url: "https://a".into(),
                after_url: "https://b".into(),
                status: ReportStatus::Broken,
                recommendation: Recommendation::DoNotDeploy,
                severity: ReportSeverity::Critical,
                created_at: Utc::now(),
            }],
            total: 3,
            limit: 1,
            skip: 0,
        });
        let pretty = format_pretty(&output, false);
        assert!(pretty.contains("1 of 3 reports"));
        assert!(pretty.contains("BROKEN DO_NOT_DEPLOY shop r-1"));
    }

    #[test]
    fn format_pretty_error_includes_hint() {
        let output = GuardOutput::error(&GuardError::Config("Invalid viewport 0x1".into()));
        let pretty = format_pretty(&output, false);
        assert!(pretty.starts_with("[ERROR] Configuration error: Invalid viewport 0x1"));
        assert!(pretty.contains("Hint: Use WIDTHxHEIGHT"));
    }

    #[test]
    fn format_pretty_analyze_lists_issues() {
        let analysis = pageguard_lib::PageAnalyzer::new()
            .unwrap()
            .analyze(
                "shop",
                "https://shop.example/",
                r#"<script>$('.cart').on('click', open)</script><link href="tailwind.css">"#,
            )
            .unwrap();
        let pretty = format_pretty(&GuardOutput::analyze(analysis), false);
        assert!(pretty.starts_with("LOW_RISK 0.10 aggressive (shop)"));
        assert!(pretty.contains("Issues: high 1, medium 0, low 0, safe 1"));
        assert!(pretty.contains("- [high] jQuery event listener .cart: CSS removal may break event targeting"));
        assert!(pretty.contains("- [safe] Tailwind CSS: Tailwind CSS can be aggressively optimized"));
    }
}
