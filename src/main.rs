mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{
    run_analyses, run_analysis, run_analyze, run_compare, run_history, run_latest, run_report,
    AnalyzeArgs, CompareArgs, HistoryArgs,
};
use tracing_subscriber::EnvFilter;

/// Env var consulted before `RUST_LOG` for the log filter.
const LOG_ENV: &str = "PAGEGUARD_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    init_tracing(args.verbose);
    run(args).await
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "pageguard=debug,pageguard_lib=debug"
    } else {
        "pageguard=info,pageguard_lib=info"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

async fn run(args: cli::Cli) -> ExitCode {
    let cli::Cli {
        command,
        verbose: _,
        config,
        db,
    } = args;

    match command {
        Commands::Compare {
            before,
            after,
            site_id,
            delays,
            viewport,
            artifacts_dir,
            nav_timeout,
            no_overlay,
            no_store,
            format,
            output,
        } => {
            run_compare(CompareArgs {
                config_path: config,
                db,
                before,
                after,
                site_id,
                delays,
                viewport,
                artifacts_dir,
                nav_timeout,
                no_overlay,
                no_store,
                format,
                output,
            })
            .await
        }
        Commands::History {
            site_id,
            status,
            limit,
            skip,
            format,
            output,
        } => run_history(
            config,
            db,
            HistoryArgs {
                site_id,
                status,
                limit,
                skip,
            },
            format,
            output,
        ),
        Commands::Report { id, format, output } => run_report(config, db, id, format, output),
        Commands::Latest {
            site_id,
            format,
            output,
        } => run_latest(config, db, site_id, format, output),
        Commands::Analyze {
            site_id,
            url,
            html,
            delay,
            viewport,
            artifacts_dir,
            nav_timeout,
            no_store,
            format,
            output,
        } => {
            run_analyze(AnalyzeArgs {
                config_path: config,
                db,
                site_id,
                url,
                html,
                delay,
                viewport,
                artifacts_dir,
                nav_timeout,
                no_store,
                format,
                output,
            })
            .await
        }
        Commands::Analysis { id, format, output } => run_analysis(config, db, id, format, output),
        Commands::Analyses {
            site_id,
            limit,
            format,
            output,
        } => run_analyses(config, db, site_id, limit, format, output),
    }
}
