use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use pageguard_lib::compare::{CaptureOrchestrator, CompareRequest, ComparisonEngine};
use pageguard_lib::storage::{ReportStore, SqliteReportStore};
use pageguard_lib::types::ComparisonReport;
use pageguard_lib::{ArtifactDir, FixtureRenderer, GuardOutput, PlaywrightRenderer, Renderer};
use tracing::info;

use crate::cli::OutputFormat;
use crate::formatting::{exit_code_for_recommendation, render_error, write_output};
use crate::settings::{
    load_config, log_effective_config, resolve_compare_settings, CompareOverrides,
    ResolvedCompareSettings,
};

pub struct CompareArgs {
    pub config_path: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub before: String,
    pub after: String,
    pub site_id: String,
    pub delays: Option<Vec<i64>>,
    pub viewport: Option<pageguard_lib::Viewport>,
    pub artifacts_dir: Option<PathBuf>,
    pub nav_timeout: Option<u64>,
    pub no_overlay: bool,
    pub no_store: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

/// Run the compare command.
pub async fn run_compare(args: CompareArgs) -> ExitCode {
    let format = args.format;
    let output = args.output.clone();
    match compare(args).await {
        Ok(report) => {
            let recommendation = report.recommendation;
            let body = GuardOutput::compare(report);
            if let Err(err) = write_output(&body, format, output) {
                eprintln!("Failed to write output: {err}");
                return ExitCode::from(2);
            }
            exit_code_for_recommendation(recommendation)
        }
        Err(err) => render_error(err, format, output),
    }
}

pub(super) fn build_renderer(settings: &ResolvedCompareSettings) -> Arc<dyn Renderer> {
    match FixtureRenderer::from_env() {
        Some(fixture) => {
            info!("rendering from fixture directory");
            Arc::new(fixture.with_html_limit(settings.browser.html_limit))
        }
        None => Arc::new(PlaywrightRenderer::new(settings.browser.clone())),
    }
}

async fn compare(args: CompareArgs) -> pageguard_lib::Result<ComparisonReport> {
    let config = load_config(args.config_path.as_deref())?;
    let settings = resolve_compare_settings(
        CompareOverrides {
            delays: args.delays,
            viewport: args.viewport,
            artifacts_dir: args.artifacts_dir,
            database: args.db,
            nav_timeout_secs: args.nav_timeout,
            no_overlay: args.no_overlay,
        },
        &config,
    )?;
    log_effective_config(args.config_path.as_deref(), &settings);

    let artifacts = ArtifactDir::new(settings.artifacts_dir.clone());
    artifacts.ensure()?;
    let renderer = build_renderer(&settings);
    let capture = CaptureOrchestrator::new(Arc::clone(&renderer), artifacts.clone())
        .with_timeouts(settings.browser.navigation_timeout, settings.capture_grace);
    let mut engine = ComparisonEngine::new(renderer, artifacts)?
        .with_capture(capture)
        .with_default_viewport(settings.viewport);
    if !settings.overlay {
        engine = engine.with_overlay(None);
    }

    let request = CompareRequest::new(args.before, args.after, args.site_id)
        .with_delays(settings.delays.clone());
    let report = engine.compare(request).await?;

    if args.no_store {
        return Ok(report);
    }
    // Stored only after the comparison completed; failed runs never reach the store.
    let store = SqliteReportStore::open(&settings.database)?;
    let id = store.store(&report)?;
    Ok(ComparisonReport {
        id: Some(id),
        ..report
    })
}
