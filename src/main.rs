use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use placerun::config::{
    DEFAULT_BENCH_ROOT, DEFAULT_BINARY, DEFAULT_LOG_DIR, DEFAULT_OUTPUT_DIR, parse_thread_spec,
};
use placerun::inputs::BENCHMARK_INPUTS;
use placerun::{
    CaseResolver, CommandBuilder, Dispatcher, ExecutionMode, HarnessConfig, HarnessError,
    RunStamp, ScreenLauncher,
};

/// Run the placement tool over benchmark cases
#[derive(Debug, Parser)]
#[command(name = "placerun", version, about = "Placement tool benchmark runner")]
struct Cli {
    /// Case index, case name, or `all`
    selector: Option<String>,

    /// Directory whose subdirectories are the benchmark cases
    #[arg(long, default_value = DEFAULT_BENCH_ROOT)]
    bench_root: PathBuf,

    /// Placement tool executable
    #[arg(long, default_value = DEFAULT_BINARY)]
    binary: PathBuf,

    /// Directory receiving placed layouts
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Directory receiving console logs
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Threads passed to the tool via -cpu: a number or `max`
    #[arg(long, default_value = "1")]
    threads: String,

    /// How each invocation is executed
    #[arg(long, value_enum, default_value_t = ExecutionMode::Direct)]
    mode: ExecutionMode,

    /// Echo every command without executing it
    #[arg(long)]
    dry_run: bool,

    /// Kill every detached session and exit
    #[arg(long)]
    kill_sessions: bool,
}

fn main() -> Result<()> {
    placerun::init_tracing();
    let cli = Cli::parse();
    let launcher = ScreenLauncher::default();

    if cli.kill_sessions {
        let dispatcher = Dispatcher::new(ExecutionMode::Detached, &launcher);
        match dispatcher.kill_all() {
            Ok(report) => println!("Killed {} sessions", report.killed.len()),
            Err(e) => error!(error = %e, "session cleanup failed"),
        }
        return Ok(());
    }

    let Some(selector) = cli.selector.as_deref() else {
        let resolver = CaseResolver::scan(&cli.bench_root)
            .unwrap_or_else(|_| CaseResolver::new(&cli.bench_root, Vec::new()));
        eprint!("{}", resolver.usage("placerun"));
        std::process::exit(1);
    };

    let config = HarnessConfig {
        threads: parse_thread_spec(&cli.threads)?,
        binary: cli.binary,
        bench_root: cli.bench_root,
        output_dir: cli.output_dir,
        log_dir: cli.log_dir,
        mode: cli.mode,
        dry_run: cli.dry_run,
        stamp: RunStamp::now(),
    };

    let resolver = match CaseResolver::scan(&config.bench_root) {
        Ok(resolver) => resolver,
        // A literal name may still point somewhere else; let it fail downstream
        Err(HarnessError::PathNotFound(_)) => CaseResolver::new(&config.bench_root, Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let cases = resolver.resolve(selector)?.into_cases();

    config.display_summary();
    info!(cases = cases.len(), run = %config.stamp, "starting batch");

    if !config.dry_run {
        std::fs::create_dir_all(&config.output_dir)?;
    }

    let builder = CommandBuilder::new(&config, &BENCHMARK_INPUTS);
    let dispatcher = Dispatcher::new(config.mode, &launcher).with_dry_run(config.dry_run);
    let report = dispatcher.run_batch(
        cases
            .iter()
            .map(|case| (case.name.clone(), builder.build(case))),
    );
    report.display_summary();

    if dispatcher.mode().is_blocking() {
        info!(failed = report.failed.len(), "batch finished");
    } else {
        info!(launched = report.launched.len(), "batch handed to detached sessions");
    }

    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
