use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use super::{AnalysisStore, ReportListing, ReportPage, ReportQuery, ReportStore};
use crate::analysis::PageAnalysis;
use crate::types::ComparisonReport;
use crate::{GuardError, Result};

pub const DEFAULT_DATABASE_FILE: &str = "pageguard.db";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS comparison_reports (
        id TEXT PRIMARY KEY,
        site_id TEXT NOT NULL,
        before_url TEXT NOT NULL,
        after_url TEXT NOT NULL,
        status TEXT NOT NULL,
        recommendation TEXT NOT NULL,
        severity TEXT NOT NULL,
        created_at TEXT NOT NULL,
        report_json TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_reports_site_created ON comparison_reports(site_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_reports_status_created ON comparison_reports(status, created_at);

    CREATE TABLE IF NOT EXISTS analyses (
        id TEXT PRIMARY KEY,
        site_id TEXT NOT NULL,
        page_url TEXT NOT NULL,
        risk_score REAL NOT NULL,
        level TEXT NOT NULL,
        created_at TEXT NOT NULL,
        analysis_json TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_analyses_site_created ON analyses(site_id, created_at);
";

const LISTING_COLUMNS: &str =
    "id, site_id, before_url, after_url, status, recommendation, severity, created_at";

/// SQLite-backed [`ReportStore`] and [`AnalysisStore`]. One connection,
/// serialized by a mutex.
pub struct SqliteReportStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

/// Listing columns as stored, before the enum/timestamp columns are parsed.
struct ListingRow {
    id: String,
    site_id: String,
    before_url: String,
    after_url: String,
    status: String,
    recommendation: String,
    severity: String,
    created_at: String,
}

impl ListingRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            site_id: row.get(1)?,
            before_url: row.get(2)?,
            after_url: row.get(3)?,
            status: row.get(4)?,
            recommendation: row.get(5)?,
            severity: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_listing(self) -> Result<ReportListing> {
        Ok(ReportListing {
            status: self.status.parse()?,
            recommendation: self.recommendation.parse()?,
            severity: self.severity.parse()?,
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            site_id: self.site_id,
            before_url: self.before_url,
            after_url: self.after_url,
        })
    }
}

impl SqliteReportStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        debug!(path = %path.display(), "report store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves no partial write behind, so a poisoned
        // lock still guards a usable connection.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    // Fixed-width UTC so lexical order is chronological order.
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| GuardError::Config(format!("Corrupt created_at '{raw}': {e}")))
}

impl ReportStore for SqliteReportStore {
    fn store(&self, report: &ComparisonReport) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let stored = ComparisonReport {
            id: Some(id.clone()),
            ..report.clone()
        };
        let json = serde_json::to_string(&stored)?;
        self.conn().execute(
            "INSERT INTO comparison_reports
                (id, site_id, before_url, after_url, status, recommendation, severity, created_at, report_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                stored.site_id,
                stored.before_url,
                stored.after_url,
                stored.status.as_str(),
                stored.recommendation.as_str(),
                stored.severity.as_str(),
                format_timestamp(&stored.created_at),
                json,
            ],
        )?;
        info!(%id, site_id = %stored.site_id, status = %stored.status, "report stored");
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<ComparisonReport> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT report_json FROM comparison_reports WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| GuardError::NotFound("Report not found".to_string()))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn list(&self, query: &ReportQuery) -> Result<ReportPage> {
        let site_id = query.site_id.as_deref();
        let status = query.status.map(|s| s.as_str());
        let conn = self.conn();

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM comparison_reports
             WHERE (?1 IS NULL OR site_id = ?1) AND (?2 IS NULL OR status = ?2)",
            params![site_id, status],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {LISTING_COLUMNS} FROM comparison_reports
             WHERE (?1 IS NULL OR site_id = ?1) AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
            .query_map(
                params![site_id, status, i64::from(query.limit), i64::from(query.skip)],
                ListingRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let results = rows
            .into_iter()
            .map(ListingRow::into_listing)
            .collect::<Result<Vec<_>>>()?;

        Ok(ReportPage {
            results,
            total: u64::try_from(total).unwrap_or_default(),
            limit: query.limit,
            skip: query.skip,
        })
    }

    fn latest(&self, site_id: &str) -> Result<ReportListing> {
        if site_id.trim().is_empty() {
            return Err(GuardError::invalid_request("siteId is required"));
        }
        let row = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {LISTING_COLUMNS} FROM comparison_reports
                     WHERE site_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1"
                ),
                params![site_id],
                ListingRow::from_row,
            )
            .optional()?;
        row.ok_or_else(|| GuardError::NotFound("No results found for this site".to_string()))?
            .into_listing()
    }
}

impl AnalysisStore for SqliteReportStore {
    fn store_analysis(&self, analysis: &PageAnalysis) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let stored = PageAnalysis {
            id: Some(id.clone()),
            ..analysis.clone()
        };
        let json = serde_json::to_string(&stored)?;
        self.conn().execute(
            "INSERT INTO analyses
                (id, site_id, page_url, risk_score, level, created_at, analysis_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                stored.site_id,
                stored.page_url,
                stored.risk_score,
                stored.recommendation.level.to_string(),
                format_timestamp(&stored.created_at),
                json,
            ],
        )?;
        info!(%id, site_id = %stored.site_id, level = %stored.recommendation.level, "analysis stored");
        Ok(id)
    }

    fn get_analysis(&self, id: &str) -> Result<PageAnalysis> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT analysis_json FROM analyses WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| GuardError::NotFound("Analysis not found".to_string()))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn recent_analyses(&self, site_id: &str, limit: u32) -> Result<Vec<PageAnalysis>> {
        if site_id.trim().is_empty() {
            return Err(GuardError::invalid_request("siteId is required"));
        }
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT analysis_json FROM analyses
             WHERE site_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![site_id, i64::from(limit)], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.iter()
            .map(|json| serde_json::from_str::<PageAnalysis>(json).map_err(GuardError::from))
            .collect()
    }
}
