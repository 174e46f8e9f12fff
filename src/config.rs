use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use clap::ValueEnum;

use crate::error::{HarnessError, Result};

pub const DEFAULT_BENCH_ROOT: &str = "../bench/benchmarks";
pub const DEFAULT_BINARY: &str = "./OpenDP";
pub const DEFAULT_OUTPUT_DIR: &str = "../output";
pub const DEFAULT_LOG_DIR: &str = "../logdir";

pub const DEFAULT_REGRESSION_BINARY: &str = "../opendp";
pub const DEFAULT_SCRIPT_EXTENSION: &str = "tcl";
pub const DEFAULT_RESULTS_DIR: &str = "exp";
pub const DEFAULT_REPORT_EXTENSION: &str = "rpt";
pub const DEFAULT_SUITE_MARKERS: [&str; 2] = ["nangate45-test", "iccad17-test"];
pub const WATCH_INTERVAL: Duration = Duration::from_secs(3);

/// How every invocation of one harness run gets executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExecutionMode {
    /// Run synchronously with inherited output
    #[default]
    #[value(name = "direct")]
    Direct,
    /// Run synchronously under valgrind
    #[value(name = "instrumented")]
    Instrumented,
    /// Fire into a detached screen session and return immediately
    #[value(name = "detached")]
    Detached,
}

impl ExecutionMode {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionMode::Direct => "direct",
            ExecutionMode::Instrumented => "instrumented",
            ExecutionMode::Detached => "detached",
        }
    }

    pub fn is_blocking(&self) -> bool {
        !matches!(self, ExecutionMode::Detached)
    }
}

/// Run identifier shared by every artifact of one batch, e.g. `2018-10-06_14:03:59`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStamp(String);

impl RunStamp {
    pub const FORMAT: &'static str = "%Y-%m-%d_%H:%M:%S";

    pub fn now() -> Self {
        Self::from_datetime(Local::now())
    }

    pub fn from_datetime(time: DateTime<Local>) -> Self {
        Self(time.format(Self::FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a thread count: a positive integer or `max` for every available core
pub fn parse_thread_spec(spec: &str) -> Result<usize> {
    let spec = spec.trim();
    if spec == "max" {
        return Ok(std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or_else(|_| num_cpus::get()));
    }
    match spec.parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(HarnessError::Usage(format!(
            "invalid thread count '{}', expected a positive integer or 'max'",
            spec
        ))),
    }
}

/// Fixed settings of a benchmark run, built once at startup
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub binary: PathBuf,
    pub bench_root: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub threads: usize,
    pub mode: ExecutionMode,
    pub dry_run: bool,
    pub stamp: RunStamp,
}

impl HarnessConfig {
    pub fn display_summary(&self) {
        println!("Harness configuration:");
        println!("   Binary: {}", self.binary.display());
        println!("   Benchmarks: {}", self.bench_root.display());
        println!("   Output: {}", self.output_dir.display());
        println!("   Logs: {}", self.log_dir.display());
        println!("   Threads: {}", self.threads);
        println!("   Mode: {}", self.mode.name());
        println!("   Run: {}", self.stamp);
        if self.dry_run {
            println!("   Dry run: commands are echoed, not executed");
        }
    }
}

/// Fixed settings of a regression pass, built once at startup
#[derive(Debug, Clone)]
pub struct RegressionConfig {
    pub root: PathBuf,
    pub binary: String,
    pub suite_markers: Vec<String>,
    pub script_extension: String,
    pub results_dir: String,
    pub report_extension: String,
    pub mode: ExecutionMode,
    pub dry_run: bool,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            binary: DEFAULT_REGRESSION_BINARY.to_string(),
            suite_markers: DEFAULT_SUITE_MARKERS.iter().map(|m| m.to_string()).collect(),
            script_extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
            results_dir: DEFAULT_RESULTS_DIR.to_string(),
            report_extension: DEFAULT_REPORT_EXTENSION.to_string(),
            mode: ExecutionMode::Direct,
            dry_run: false,
        }
    }
}
