//! Persistence of completed comparison reports and page analyses.
//!
//! [`ReportStore`] and [`AnalysisStore`] are the seams the CLI writes
//! through; [`SqliteReportStore`] implements both.

mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::PageAnalysis;
use crate::types::{ComparisonReport, Recommendation, ReportSeverity, ReportStatus};
use crate::Result;

pub use sqlite::{SqliteReportStore, DEFAULT_DATABASE_FILE};

pub const DEFAULT_PAGE_LIMIT: u32 = 50;

pub const DEFAULT_ANALYSIS_LIMIT: u32 = 10;

/// Filters for [`ReportStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub site_id: Option<String>,
    pub status: Option<ReportStatus>,
    pub limit: u32,
    pub skip: u32,
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self {
            site_id: None,
            status: None,
            limit: DEFAULT_PAGE_LIMIT,
            skip: 0,
        }
    }
}

/// Summary row for list views; the full report is fetched with [`ReportStore::get`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListing {
    pub id: String,
    pub site_id: String,
    pub before_url: String,
    pub after_url: String,
    pub status: ReportStatus,
    pub recommendation: Recommendation,
    pub severity: ReportSeverity,
    pub created_at: DateTime<Utc>,
}

/// One page of [`ReportListing`]s, newest first. `total` counts every match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub results: Vec<ReportListing>,
    pub total: u64,
    pub limit: u32,
    pub skip: u32,
}

pub trait ReportStore: Send + Sync {
    /// Persists `report` under a fresh id and returns the id.
    fn store(&self, report: &ComparisonReport) -> Result<String>;

    /// Fails with `NotFound` when no report has this id.
    fn get(&self, id: &str) -> Result<ComparisonReport>;

    fn list(&self, query: &ReportQuery) -> Result<ReportPage>;

    /// Most recent listing for a site.
    fn latest(&self, site_id: &str) -> Result<ReportListing>;
}

pub trait AnalysisStore: Send + Sync {
    /// Persists `analysis` under a fresh id and returns the id.
    fn store_analysis(&self, analysis: &PageAnalysis) -> Result<String>;

    /// Fails with `NotFound` when no analysis has this id.
    fn get_analysis(&self, id: &str) -> Result<PageAnalysis>;

    /// A site's analyses, newest first.
    fn recent_analyses(&self, site_id: &str, limit: u32) -> Result<Vec<PageAnalysis>>;
}
