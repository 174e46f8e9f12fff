//! Regression passes over committed test-suite directories.
//!
//! A pass is two-phase: every case's results directory is cleared first,
//! then each case's scripts are dispatched. The watch view only reads the
//! report files those runs leave behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::case::{Case, list_case_names};
use crate::command::{Invocation, script_invocation};
use crate::config::RegressionConfig;
use crate::dispatch::{BatchReport, Dispatcher};
use crate::error::{HarnessError, Result};
use crate::inputs::{self, NameFilter};

/// Case directories whose names contain `marker`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    pub marker: String,
    pub cases: Vec<Case>,
}

/// One script of one case and the log it will produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub case: Case,
    pub script: String,
    pub log: PathBuf,
    pub invocation: Invocation,
}

/// Outcome of clearing results directories before a pass
#[derive(Debug, Default)]
pub struct ResetReport {
    pub removed: usize,
    /// Cases whose stale results are still on disk
    pub failed: Vec<(Case, HarnessError)>,
}

/// Match every marker against the immediate subdirectories of `root`.
/// Suites keep marker order, cases are sorted by name.
pub fn discover_suites(root: &Path, markers: &[String]) -> Result<Vec<Suite>> {
    let names = list_case_names(root)?;
    Ok(markers
        .iter()
        .map(|marker| Suite {
            marker: marker.clone(),
            cases: names
                .iter()
                .filter(|name| name.contains(marker.as_str()))
                .map(|name| Case::new(root, name))
                .collect(),
        })
        .collect())
}

fn is_not_found(error: &std::io::Error) -> bool {
    error.kind() == ErrorKind::NotFound
}

pub struct RegressionRunner<'a> {
    config: &'a RegressionConfig,
    dispatcher: &'a Dispatcher<'a>,
}

impl<'a> RegressionRunner<'a> {
    pub fn new(config: &'a RegressionConfig, dispatcher: &'a Dispatcher<'a>) -> Self {
        Self { config, dispatcher }
    }

    fn results_dir(&self, case: &Case) -> PathBuf {
        case.path.join(&self.config.results_dir)
    }

    /// Remove every case's results directory. A case whose stale results
    /// cannot be removed is reported and must not be run.
    pub fn reset(&self, suites: &[Suite]) -> ResetReport {
        let mut report = ResetReport::default();
        for case in suites.iter().flat_map(|s| &s.cases) {
            let dir = self.results_dir(case);
            println!("rm -rf {}", dir.display());
            if self.config.dry_run {
                continue;
            }
            match fs::remove_dir_all(&dir) {
                Ok(()) => report.removed += 1,
                Err(e) if is_not_found(&e) => {}
                Err(e) => {
                    warn!(case = %case.name, error = %e, "could not clear results, skipping case");
                    report.failed.push((
                        case.clone(),
                        HarnessError::ResultsNotCleared { path: dir, source: e },
                    ));
                }
            }
        }
        info!(removed = report.removed, blocked = report.failed.len(), "results cleared");
        report
    }

    /// Scripts of `case` in sorted order, each with its invocation
    pub fn enumerate(&self, case: &Case) -> Result<Vec<RunRecord>> {
        let scripts = inputs::collect(&case.path, &self.config.script_extension, NameFilter::Any)?;

        let mut records = Vec::with_capacity(scripts.len());
        for path in scripts {
            let Some(script) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let invocation =
                script_invocation(case, &self.config.binary, script, &self.config.results_dir);
            records.push(RunRecord {
                case: case.clone(),
                script: script.to_string(),
                log: case.path.join(&invocation.log),
                invocation,
            });
        }
        Ok(records)
    }

    fn case_items(&self, case: &Case) -> Vec<(String, Result<Invocation>)> {
        println!("Access {}:", case.name);
        match self.enumerate(case) {
            Ok(records) => records
                .into_iter()
                .map(|record| {
                    println!("  {} -> {}", record.script, record.log.display());
                    (record.invocation.name.clone(), Ok(record.invocation))
                })
                .collect(),
            Err(e) => vec![(case.name.clone(), Err(e))],
        }
    }

    /// Clear all results, then dispatch every script of every case whose
    /// results were cleared. Blocked cases are recorded as failures.
    pub fn run(&self, suites: &[Suite]) -> BatchReport {
        let mut blocked = self.reset(suites).failed;

        let items = suites
            .iter()
            .flat_map(|suite| &suite.cases)
            .flat_map(move |case| {
                match blocked.iter().position(|(c, _)| c.path == case.path) {
                    Some(pos) => {
                        let (case, e) = blocked.swap_remove(pos);
                        vec![(case.name, Err(e))]
                    }
                    None => self.case_items(case),
                }
            });
        self.dispatcher.run_batch(items)
    }

    /// `path:line` for every line of every report file, like `grep -r ''`.
    /// Unreadable directories or files are skipped, invalid UTF-8 is replaced.
    pub fn collect_reports(&self, suites: &[Suite]) -> String {
        let mut text = String::new();
        for case in suites.iter().flat_map(|s| &s.cases) {
            let dir = self.results_dir(case);
            let reports = match inputs::collect(&dir, &self.config.report_extension, NameFilter::Any) {
                Ok(reports) => reports,
                Err(HarnessError::PathNotFound(_)) => continue,
                Err(HarnessError::Io(e)) if is_not_found(&e) => continue,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping results directory");
                    continue;
                }
            };

            for report in reports {
                let bytes = match fs::read(&report) {
                    Ok(bytes) => bytes,
                    Err(e) if is_not_found(&e) => continue,
                    Err(e) => {
                        warn!(report = %report.display(), error = %e, "skipping report");
                        continue;
                    }
                };
                for line in String::from_utf8_lossy(&bytes).lines() {
                    text.push_str(&format!("{}:{}\n", report.display(), line));
                }
            }
        }
        text
    }

    /// Redraw the report view every `interval` until interrupted
    pub fn watch(&self, interval: Duration) -> ! {
        loop {
            let suites = match discover_suites(&self.config.root, &self.config.suite_markers) {
                Ok(suites) => suites,
                Err(HarnessError::PathNotFound(_)) => Vec::new(),
                Err(e) => {
                    warn!(root = %self.config.root.display(), error = %e, "could not list suites");
                    Vec::new()
                }
            };
            let reports = self.collect_reports(&suites);

            print!("\x1B[2J\x1B[H");
            println!(
                "Every {}s: *.{} under {}/\n",
                interval.as_secs(),
                self.config.report_extension,
                self.config.results_dir
            );
            print!("{}", reports);

            thread::sleep(interval);
        }
    }
}
