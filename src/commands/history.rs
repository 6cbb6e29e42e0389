use std::path::PathBuf;
use std::process::ExitCode;

use pageguard_lib::storage::{ReportQuery, ReportStore, SqliteReportStore};
use pageguard_lib::types::ReportStatus;
use pageguard_lib::{GuardError, GuardOutput};

use crate::cli::OutputFormat;
use crate::formatting::{render_error, write_output};
use crate::settings::{load_config, resolve_database};

pub struct HistoryArgs {
    pub site_id: Option<String>,
    pub status: Option<String>,
    pub limit: u32,
    pub skip: u32,
}

pub(super) fn open_store(
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
) -> Result<SqliteReportStore, GuardError> {
    let config = load_config(config_path.as_deref())?;
    let path = resolve_database(db, &config);
    if !path.is_file() {
        return Err(GuardError::NotFound(format!(
            "No report database at {}",
            path.display()
        )));
    }
    SqliteReportStore::open(path)
}

pub(super) fn emit(
    result: Result<GuardOutput, GuardError>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    match result {
        Ok(body) => match write_output(&body, format, output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Failed to write output: {err}");
                ExitCode::from(2)
            }
        },
        Err(err) => render_error(err, format, output),
    }
}

/// Run the history command.
pub fn run_history(
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
    args: HistoryArgs,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let result = (|| -> Result<GuardOutput, GuardError> {
        let status = args
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<ReportStatus>)
            .transpose()?;
        let store = open_store(config_path, db)?;
        let page = store.list(&ReportQuery {
            site_id: args.site_id.filter(|s| !s.trim().is_empty()),
            status,
            limit: args.limit,
            skip: args.skip,
        })?;
        Ok(GuardOutput::history(page))
    })();
    emit(result, format, output)
}

/// Run the report command.
pub fn run_report(
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
    id: String,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let result = open_store(config_path, db)
        .and_then(|store| store.get(&id))
        .map(GuardOutput::report);
    emit(result, format, output)
}

/// Run the latest command.
pub fn run_latest(
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
    site_id: String,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let result = open_store(config_path, db)
        .and_then(|store| store.latest(&site_id))
        .map(GuardOutput::latest);
    emit(result, format, output)
}
