//! Page Guard Library
//!
//! Screens a page change for visual and functional regressions: the page is
//! rendered before and after the change, the renderings are compared, and the
//! differences are turned into a deployment verdict.
//!
//! # Module Overview
//!
//! - [`analysis`] - static optimization-risk analysis of one page
//! - [`browser`] - Playwright and fixture renderers
//! - [`compare`] - capture, diff, matching, classification and aggregation
//! - [`scripts`] - script-risk classification of page HTML
//! - [`storage`] - SQLite report/analysis store and history queries
//! - [`config`] - configuration file support
//! - [`types`] - core data types
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pageguard_lib::{ArtifactDir, CompareRequest, ComparisonEngine, FixtureRenderer};
//! use pageguard_lib::storage::{ReportStore, SqliteReportStore};
//!
//! # async fn example() -> pageguard_lib::Result<()> {
//! let renderer = Arc::new(FixtureRenderer::new("fixtures"));
//! let engine = ComparisonEngine::new(renderer, ArtifactDir::new("artifacts"))?;
//! let report = engine
//!     .compare(CompareRequest::new("fixture://home", "fixture://home-optimized", "site-1"))
//!     .await?;
//!
//! let store = SqliteReportStore::open("pageguard.db")?;
//! let id = store.store(&report)?;
//! println!("{id}: {}", report.recommendation);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod artifacts;
pub mod browser;
pub mod compare;
pub mod config;
pub mod error;
pub mod output;
pub mod scripts;
pub mod storage;
pub mod types;
pub mod viewport;

pub use analysis::{PageAnalysis, PageAnalyzer, RiskLevel};
pub use artifacts::ArtifactDir;
pub use browser::{
    BrowserOptions, CaptureRequest, FixtureRenderer, PlaywrightRenderer, RenderError, Renderer,
    DEFAULT_NAVIGATION_TIMEOUT, FIXTURE_DIR_ENV,
};
pub use compare::{CompareRequest, CompareResponse, ComparisonEngine};
pub use config::Config;
pub use error::{ErrorCategory, ErrorPayload, GuardError, Result};
pub use output::{GuardOutput, PAGEGUARD_OUTPUT_VERSION};
pub use scripts::{PatternScriptClassifier, ScriptRiskClassifier};
pub use storage::{AnalysisStore, ReportQuery, ReportStore, SqliteReportStore};
pub use types::{
    ComparisonIssue, ComparisonReport, Recommendation, ReportSeverity, ReportStatus, Severity,
    SnapshotCapture,
};
pub use viewport::Viewport;
