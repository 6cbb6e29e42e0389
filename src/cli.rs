use clap::{Parser, Subcommand, ValueEnum};
use pageguard_lib::storage::DEFAULT_ANALYSIS_LIMIT;
use pageguard_lib::Viewport;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pageguard")]
#[command(
    version,
    about = "Page Guard - Screen page optimizations for visual and functional regressions",
    long_about = "Page Guard\n\nModes:\n- compare: render a page before and after a change, diff the renderings and print a deployment verdict.\n- history: list stored comparison reports.\n- report: print one stored report.\n- latest: print the most recent verdict for a site.\n- analyze: score one page's optimization risk from its HTML.\n- analysis / analyses: print stored analyses.\n\nSet PAGEGUARD_FIXTURE_DIR to render from fixture files instead of Playwright.\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) to set defaults for viewport/delays/paths/timeouts; CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "SQLite report database (default: pageguard.db or the config's `database`)"
    )]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare a page before and after a change
    Compare {
        #[arg(long, help = "URL of the page before the change")]
        before: String,

        #[arg(long, help = "URL of the page after the change")]
        after: String,

        #[arg(long, help = "Site identifier the report is filed under")]
        site_id: String,

        #[arg(
            long,
            value_delimiter = ',',
            allow_negative_numbers = true,
            help = "Settle delays in ms for the after captures (max 3, comma-separated; default 3000)"
        )]
        delays: Option<Vec<i64>>,

        #[arg(long, help = "Viewport dimensions (WIDTHxHEIGHT, default 1920x1080)")]
        viewport: Option<Viewport>,

        #[arg(
            long,
            value_name = "PATH",
            help = "Directory for screenshots and overlays; created if missing"
        )]
        artifacts_dir: Option<PathBuf>,

        #[arg(
            long,
            value_name = "SECS",
            help = "Navigation timeout (seconds) for each capture (default 60)"
        )]
        nav_timeout: Option<u64>,

        #[arg(long, help = "Skip rendering the highlighted overlay screenshot")]
        no_overlay: bool,

        #[arg(long, help = "Do not persist the report")]
        no_store: bool,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// List stored comparison reports, newest first
    History {
        #[arg(long, help = "Only reports for this site")]
        site_id: Option<String>,

        #[arg(long, help = "Only reports with this status (SAFE, WARNING, BROKEN)")]
        status: Option<String>,

        #[arg(long, default_value = "50", help = "Maximum number of results")]
        limit: u32,

        #[arg(long, default_value = "0", help = "Number of results to skip")]
        skip: u32,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Print one stored report
    Report {
        #[arg(help = "Report id as printed by `compare` or `history`")]
        id: String,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Print the most recent verdict for a site
    Latest {
        #[arg(long, help = "Site identifier")]
        site_id: String,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Score how risky it is to optimize a page
    Analyze {
        #[arg(long, help = "Site identifier the analysis is filed under")]
        site_id: String,

        #[arg(
            long,
            required_unless_present = "html",
            help = "Page URL; rendered to obtain its HTML unless --html is given"
        )]
        url: Option<String>,

        #[arg(long, value_name = "PATH", help = "Read the page HTML from this file instead of rendering")]
        html: Option<PathBuf>,

        #[arg(
            long,
            value_name = "MS",
            allow_negative_numbers = true,
            help = "Settle delay in ms before the HTML is read (default: first configured delay)"
        )]
        delay: Option<i64>,

        #[arg(long, help = "Viewport dimensions (WIDTHxHEIGHT, default 1920x1080)")]
        viewport: Option<Viewport>,

        #[arg(long, value_name = "PATH", help = "Directory for the page screenshot")]
        artifacts_dir: Option<PathBuf>,

        #[arg(long, value_name = "SECS", help = "Navigation timeout (seconds) for the capture")]
        nav_timeout: Option<u64>,

        #[arg(long, help = "Do not persist the analysis")]
        no_store: bool,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Print one stored analysis
    Analysis {
        #[arg(help = "Analysis id as printed by `analyze`")]
        id: String,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// List a site's stored analyses, newest first
    Analyses {
        #[arg(long, help = "Site identifier")]
        site_id: String,

        #[arg(long, default_value_t = DEFAULT_ANALYSIS_LIMIT, help = "Maximum number of results")]
        limit: u32,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}
