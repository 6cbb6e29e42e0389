mod analyze;
mod compare;
mod history;

pub use analyze::{run_analyses, run_analysis, run_analyze, AnalyzeArgs};
pub use compare::{run_compare, CompareArgs};
pub use history::{run_history, run_latest, run_report, HistoryArgs};
