use std::path::PathBuf;
use std::process::ExitCode;

use pageguard_lib::analysis::{PageAnalysis, PageAnalyzer};
use pageguard_lib::compare::{plan_delays, CaptureOrchestrator, DEFAULT_DELAY_MS};
use pageguard_lib::storage::{AnalysisStore, SqliteReportStore};
use pageguard_lib::{ArtifactDir, GuardError, GuardOutput, Viewport};
use tracing::debug;

use super::compare::build_renderer;
use super::history::{emit, open_store};
use crate::cli::OutputFormat;
use crate::formatting::{render_error, write_output};
use crate::settings::{load_config, log_effective_config, resolve_compare_settings, CompareOverrides};

pub struct AnalyzeArgs {
    pub config_path: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub site_id: String,
    pub url: Option<String>,
    pub html: Option<PathBuf>,
    pub delay: Option<i64>,
    pub viewport: Option<Viewport>,
    pub artifacts_dir: Option<PathBuf>,
    pub nav_timeout: Option<u64>,
    pub no_store: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

/// Run the analyze command. Any completed analysis exits 0; the risk level
/// is advice for the optimizer, not a gate.
pub async fn run_analyze(args: AnalyzeArgs) -> ExitCode {
    let format = args.format;
    let output = args.output.clone();
    match analyze(args).await {
        Ok(analysis) => match write_output(&GuardOutput::analyze(analysis), format, output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Failed to write output: {err}");
                ExitCode::from(2)
            }
        },
        Err(err) => render_error(err, format, output),
    }
}

async fn analyze(args: AnalyzeArgs) -> pageguard_lib::Result<PageAnalysis> {
    let config = load_config(args.config_path.as_deref())?;
    let settings = resolve_compare_settings(
        CompareOverrides {
            delays: args.delay.map(|d| vec![d]),
            viewport: args.viewport,
            artifacts_dir: args.artifacts_dir,
            database: args.db,
            nav_timeout_secs: args.nav_timeout,
            no_overlay: true,
        },
        &config,
    )?;
    log_effective_config(args.config_path.as_deref(), &settings);

    let (page_url, html) = match (args.url, args.html) {
        (url, Some(path)) => {
            debug!(path = %path.display(), "reading page html from file");
            let html = std::fs::read_to_string(&path)?;
            (url.unwrap_or_else(|| path.display().to_string()), html)
        }
        (Some(url), None) => {
            url::Url::parse(&url)?;
            let artifacts = ArtifactDir::new(settings.artifacts_dir.clone());
            artifacts.ensure()?;
            let capture = CaptureOrchestrator::new(build_renderer(&settings), artifacts)
                .with_timeouts(settings.browser.navigation_timeout, settings.capture_grace);
            let delay_ms = plan_delays(Some(settings.delays.as_slice()))
                .first()
                .copied()
                .unwrap_or(DEFAULT_DELAY_MS);
            let snapshot = capture.capture_page(&url, delay_ms, settings.viewport).await?;
            (url, snapshot.full_html)
        }
        (None, None) => return Err(GuardError::invalid_request("Missing required fields")),
    };

    let analysis = PageAnalyzer::new()?.analyze(&args.site_id, &page_url, &html)?;
    if args.no_store {
        return Ok(analysis);
    }
    let store = SqliteReportStore::open(&settings.database)?;
    let id = store.store_analysis(&analysis)?;
    Ok(PageAnalysis {
        id: Some(id),
        ..analysis
    })
}

/// Run the analysis command.
pub fn run_analysis(
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
    id: String,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let result = open_store(config_path, db)
        .and_then(|store| store.get_analysis(&id))
        .map(GuardOutput::analysis);
    emit(result, format, output)
}

/// Run the analyses command.
pub fn run_analyses(
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
    site_id: String,
    limit: u32,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let result = open_store(config_path, db)
        .and_then(|store| store.recent_analyses(&site_id, limit))
        .map(|results| GuardOutput::analyses(site_id.as_str(), results));
    emit(result, format, output)
}
