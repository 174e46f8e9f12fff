// Regression runner over `*-test*` suite directories
// Usage: regression [run | skill | get]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use placerun::config::{DEFAULT_REGRESSION_BINARY, DEFAULT_SUITE_MARKERS, WATCH_INTERVAL};
use placerun::regression::discover_suites;
use placerun::{Dispatcher, ExecutionMode, RegressionConfig, RegressionRunner, ScreenLauncher};

#[derive(Debug, Parser)]
#[command(name = "regression", about = "Placement tool regression runner")]
struct Cli {
    /// `run`, `skill`, or anything else to watch the report files
    action: Option<String>,

    /// Directory containing the suite directories
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Tool executable, relative to each case directory
    #[arg(long, default_value = DEFAULT_REGRESSION_BINARY)]
    binary: String,

    /// Suite marker matched against directory names (repeatable)
    #[arg(long = "suite")]
    suites: Vec<String>,

    /// How each script is executed
    #[arg(long, value_enum, default_value_t = ExecutionMode::Direct)]
    mode: ExecutionMode,

    /// Echo every command without executing it
    #[arg(long)]
    dry_run: bool,
}

fn print_usage() {
    println!("Usage: regression run");
    println!("Usage: regression skill");
    println!("Usage: regression get");
}

fn main() -> Result<()> {
    placerun::init_tracing();
    let cli = Cli::parse();

    let Some(action) = cli.action.as_deref() else {
        print_usage();
        return Ok(());
    };

    let config = RegressionConfig {
        root: cli.root,
        binary: cli.binary,
        suite_markers: if cli.suites.is_empty() {
            DEFAULT_SUITE_MARKERS.iter().map(|m| m.to_string()).collect()
        } else {
            cli.suites
        },
        mode: cli.mode,
        dry_run: cli.dry_run,
        ..RegressionConfig::default()
    };

    let launcher = ScreenLauncher::default();
    let dispatcher = Dispatcher::new(config.mode, &launcher).with_dry_run(config.dry_run);
    let runner = RegressionRunner::new(&config, &dispatcher);

    match action {
        "run" => {
            let suites = discover_suites(&config.root, &config.suite_markers)?;
            info!(
                suites = suites.len(),
                cases = suites.iter().map(|s| s.cases.len()).sum::<usize>(),
                "starting regression"
            );
            let report = runner.run(&suites);
            report.display_summary();
        }
        "skill" => match dispatcher.kill_all() {
            Ok(report) => {
                println!("Killed {} sessions", report.killed.len());
                for (session, reason) in &report.failed {
                    println!("   could not kill {}: {}", session, reason);
                }
            }
            Err(e) => warn!(error = %e, "session cleanup failed"),
        },
        _ => runner.watch(WATCH_INTERVAL),
    }

    Ok(())
}
