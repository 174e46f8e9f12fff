//! Runs invocations under the configured execution mode.

use std::fs;
use std::process::{Command, ExitStatus};

use tracing::{debug, info, warn};

use crate::command::Invocation;
use crate::config::ExecutionMode;
use crate::error::{HarnessError, Result};
use crate::launcher::{BackgroundLauncher, KillReport};

/// What happened to one dispatched invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Blocking run finished, status untouched
    Completed(ExitStatus),
    /// Handed to a background session with this name
    Launched(String),
    /// Dry run, nothing executed
    Echoed,
}

#[derive(Debug, Clone)]
pub struct Dispatch {
    pub command: String,
    pub outcome: Outcome,
}

/// Per-case results of one batch; failures never stop the batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<String>,
    pub launched: Vec<String>,
    pub echoed: Vec<String>,
    pub failed: Vec<(String, HarnessError)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.launched.len() + self.echoed.len() + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn display_summary(&self) {
        println!("{}", "=".repeat(60));
        println!(
            "Batch: {} cases, {} completed, {} launched, {} echoed, {} failed",
            self.total(),
            self.completed.len(),
            self.launched.len(),
            self.echoed.len(),
            self.failed.len()
        );
        for (name, error) in &self.failed {
            println!("   FAIL {}: {}", name, error);
        }
    }
}

/// Executes invocations one at a time under a single [`ExecutionMode`]
pub struct Dispatcher<'a> {
    mode: ExecutionMode,
    dry_run: bool,
    shell: String,
    launcher: &'a dyn BackgroundLauncher,
}

impl<'a> Dispatcher<'a> {
    pub fn new(mode: ExecutionMode, launcher: &'a dyn BackgroundLauncher) -> Self {
        Self {
            mode,
            dry_run: false,
            shell: "bash".to_string(),
            launcher,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Shell line this dispatcher would run for `invocation`
    pub fn command_for(&self, invocation: &Invocation) -> String {
        match self.mode {
            ExecutionMode::Instrumented => invocation.memcheck_line(),
            ExecutionMode::Direct | ExecutionMode::Detached => invocation.command_line(),
        }
    }

    fn run_blocking(&self, command: &str) -> Result<ExitStatus> {
        // pipefail keeps the tool's status instead of tee's
        let status = Command::new(&self.shell)
            .args(["-o", "pipefail", "-c", command])
            .status()?;
        Ok(status)
    }

    /// Echo the command line, then execute it
    pub fn dispatch(&self, invocation: &Invocation) -> Result<Dispatch> {
        let command = self.command_for(invocation);
        println!("{}", command);

        if self.dry_run {
            return Ok(Dispatch {
                command,
                outcome: Outcome::Echoed,
            });
        }

        if let Some(dir) = invocation.log_dir() {
            fs::create_dir_all(&dir)?;
        }

        let outcome = match self.mode {
            ExecutionMode::Direct | ExecutionMode::Instrumented => {
                debug!(name = %invocation.name, mode = self.mode.name(), "running");
                let status = self.run_blocking(&command)?;
                if let Some(output) = &invocation.output {
                    if status.success() && !output.exists() {
                        warn!(name = %invocation.name, output = %output.display(), "no placed layout written");
                    }
                }
                Outcome::Completed(status)
            }
            ExecutionMode::Detached => {
                self.launcher.launch(&invocation.name, &command)?;
                info!(session = %invocation.name, "launched detached session");
                Outcome::Launched(invocation.name.clone())
            }
        };

        Ok(Dispatch { command, outcome })
    }

    /// Dispatch every prepared item in order. Preparation errors and failing
    /// runs are recorded against their case and the batch moves on.
    pub fn run_batch<I>(&self, items: I) -> BatchReport
    where
        I: IntoIterator<Item = (String, Result<Invocation>)>,
    {
        let mut report = BatchReport::default();

        for (name, prepared) in items {
            let invocation = match prepared {
                Ok(invocation) => invocation,
                Err(e) => {
                    warn!(case = %name, error = %e, "skipping case");
                    report.failed.push((name, e));
                    continue;
                }
            };

            match self.dispatch(&invocation) {
                Ok(Dispatch {
                    outcome: Outcome::Completed(status),
                    ..
                }) => {
                    if status.success() {
                        report.completed.push(name);
                    } else {
                        warn!(case = %name, %status, "external tool failed");
                        println!("   {} exited with {}", name, status);
                        report.failed.push((
                            name.clone(),
                            HarnessError::ExternalToolFailure { name, status },
                        ));
                    }
                }
                Ok(Dispatch {
                    outcome: Outcome::Launched(_),
                    ..
                }) => report.launched.push(name),
                Ok(Dispatch {
                    outcome: Outcome::Echoed,
                    ..
                }) => report.echoed.push(name),
                Err(e) => {
                    warn!(case = %name, error = %e, "dispatch failed");
                    report.failed.push((name, e));
                }
            }
        }

        report
    }

    /// Best-effort termination of every background session
    pub fn kill_all(&self) -> Result<KillReport> {
        let report = self.launcher.kill_all()?;
        for session in &report.killed {
            info!(session = %session, "killed session");
        }
        for (session, reason) in &report.failed {
            warn!(session = %session, reason = %reason, "could not kill session");
        }
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::case::Case;
    use crate::command::script_invocation;
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Records launches instead of talking to a multiplexer
    #[derive(Default)]
    pub(crate) struct RecordingLauncher {
        pub launched: RefCell<Vec<(String, String)>>,
    }

    impl BackgroundLauncher for RecordingLauncher {
        fn launch(&self, name: &str, command: &str) -> Result<()> {
            self.launched
                .borrow_mut()
                .push((name.to_string(), command.to_string()));
            Ok(())
        }

        fn kill_all(&self) -> Result<KillReport> {
            let killed = self
                .launched
                .borrow_mut()
                .drain(..)
                .map(|(name, _)| name)
                .collect();
            Ok(KillReport {
                killed,
                failed: Vec::new(),
            })
        }
    }

    fn shell_invocation(dir: &Path, name: &str, body: &str) -> Invocation {
        Invocation {
            name: name.to_string(),
            workdir: None,
            body: body.to_string(),
            log: dir.join("logs").join(format!("{}_out.log", name)),
            memcheck_log: dir.join("logs").join(format!("{}_valgrind.log", name)),
            output: None,
        }
    }

    #[test]
    fn test_direct_run_tees_into_log() {
        let dir = TempDir::new().unwrap();
        let launcher = RecordingLauncher::default();
        let dispatcher = Dispatcher::new(ExecutionMode::Direct, &launcher);

        let invocation = shell_invocation(dir.path(), "caseA", "echo placed; echo oops >&2");
        let dispatch = dispatcher.dispatch(&invocation).unwrap();
        match dispatch.outcome {
            Outcome::Completed(status) => assert!(status.success()),
            other => panic!("expected completion, got {:?}", other),
        }

        let log = fs::read_to_string(&invocation.log).unwrap();
        assert!(log.contains("placed"));
        assert!(log.contains("oops"));
        assert!(launcher.launched.borrow().is_empty());
    }

    #[test]
    fn test_log_path_with_space_is_captured() {
        let dir = TempDir::new().unwrap();
        let launcher = RecordingLauncher::default();
        let dispatcher = Dispatcher::new(ExecutionMode::Direct, &launcher);

        let mut invocation = shell_invocation(dir.path(), "des perf", "echo first; echo second");
        invocation.log = dir.path().join("des perf").join("des perf_out.log");
        let dispatch = dispatcher.dispatch(&invocation).unwrap();
        assert!(matches!(dispatch.outcome, Outcome::Completed(status) if status.success()));

        let log = fs::read_to_string(&invocation.log).unwrap();
        assert_eq!(log, "first\nsecond\n");
        assert_eq!(fs::read_dir(dir.path().join("des perf")).unwrap().count(), 1);
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let launcher = RecordingLauncher::default();
        let dispatcher = Dispatcher::new(ExecutionMode::Direct, &launcher);

        let items = vec![
            ("caseA".to_string(), Ok(shell_invocation(dir.path(), "caseA", "false"))),
            (
                "caseB".to_string(),
                Err(HarnessError::PathNotFound(PathBuf::from("caseB"))),
            ),
            ("caseC".to_string(), Ok(shell_invocation(dir.path(), "caseC", "echo ok"))),
        ];
        let report = dispatcher.run_batch(items);

        assert_eq!(report.total(), 3);
        assert_eq!(report.completed, vec!["caseC".to_string()]);
        assert_eq!(report.failed.len(), 2);
        assert!(matches!(
            report.failed[0].1,
            HarnessError::ExternalToolFailure { .. }
        ));
        assert!(matches!(report.failed[1].1, HarnessError::PathNotFound(_)));
        assert!(dir.path().join("logs/caseC_out.log").exists());
    }

    #[test]
    fn test_detached_launches_and_returns() {
        let dir = TempDir::new().unwrap();
        let launcher = RecordingLauncher::default();
        let dispatcher = Dispatcher::new(ExecutionMode::Detached, &launcher);

        let case = Case::new(dir.path(), "nangate45-test-1");
        fs::create_dir(&case.path).unwrap();
        let invocation = script_invocation(&case, "../opendp", "a.tcl", "exp");
        let report = dispatcher.run_batch(vec![(case.name.clone(), Ok(invocation.clone()))]);

        assert_eq!(report.launched, vec!["nangate45-test-1".to_string()]);
        let launched = launcher.launched.borrow();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].0, "nangate45-test-1_a.tcl");
        assert_eq!(launched[0].1, invocation.command_line());
        assert!(case.path.join("exp").is_dir());
        drop(launched);

        let killed = dispatcher.kill_all().unwrap();
        assert_eq!(killed.killed, vec!["nangate45-test-1_a.tcl".to_string()]);
        assert!(killed.is_clean());
    }

    #[test]
    fn test_kill_all_without_sessions() {
        let launcher = RecordingLauncher::default();
        let dispatcher = Dispatcher::new(ExecutionMode::Detached, &launcher);
        let report = dispatcher.kill_all().unwrap();
        assert!(report.killed.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn test_instrumented_dry_run_echoes_memcheck_line() {
        let dir = TempDir::new().unwrap();
        let launcher = RecordingLauncher::default();
        let dispatcher = Dispatcher::new(ExecutionMode::Instrumented, &launcher).with_dry_run(true);

        let invocation = shell_invocation(dir.path(), "caseA", "./OpenDP");
        let dispatch = dispatcher.dispatch(&invocation).unwrap();
        assert_eq!(dispatch.outcome, Outcome::Echoed);
        assert!(dispatch.command.contains("valgrind --log-fd=1 ./OpenDP"));
        assert!(dispatch.command.ends_with("caseA_valgrind.log"));
        assert!(!dir.path().join("logs").exists());
    }
}
