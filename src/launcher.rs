//! Background job launching for detached runs.
//!
//! The harness never schedules work itself. Detached invocations are handed
//! to a [`BackgroundLauncher`], which owns concurrency and cancellation.

use std::process::{Command, Stdio};

use crate::error::{HarnessError, Result};

/// Outcome of a best-effort kill of every background session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KillReport {
    pub killed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl KillReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Capability to run commands in the background and cancel them later
pub trait BackgroundLauncher {
    /// Start `command` in a new session called `name` and return immediately
    fn launch(&self, name: &str, command: &str) -> Result<()>;

    /// Terminate every session currently visible to the launcher
    fn kill_all(&self) -> Result<KillReport>;
}

/// Launches each command into its own detached GNU screen session
#[derive(Debug, Clone)]
pub struct ScreenLauncher {
    program: String,
    shell: String,
}

impl Default for ScreenLauncher {
    fn default() -> Self {
        Self {
            program: "screen".to_string(),
            shell: "bash".to_string(),
        }
    }
}

impl ScreenLauncher {
    fn run(&self, args: &[&str]) -> Result<()> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                HarnessError::SessionControlFailure(format!("cannot run {}: {}", self.program, e))
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(HarnessError::SessionControlFailure(format!(
                "{} {} failed: {}",
                self.program,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    /// Session ids (`<pid>.<name>`) currently listed by `screen -ls`
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        let output = Command::new(&self.program)
            .arg("-ls")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                HarnessError::SessionControlFailure(format!("cannot run {}: {}", self.program, e))
            })?;

        // screen exits non-zero when there is nothing to list
        Ok(parse_session_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl BackgroundLauncher for ScreenLauncher {
    fn launch(&self, name: &str, command: &str) -> Result<()> {
        self.run(&["-dmS", name, &self.shell])?;
        let keystrokes = format!("{}\n", command);
        self.run(&["-S", name, "-X", "stuff", &keystrokes])
    }

    fn kill_all(&self) -> Result<KillReport> {
        let mut report = KillReport::default();
        for session in self.list_sessions()? {
            match self.run(&["-S", &session, "-X", "quit"]) {
                Ok(()) => report.killed.push(session),
                Err(e) => report.failed.push((session, e.to_string())),
            }
        }
        Ok(report)
    }
}

/// Extract session ids from `screen -ls` output
pub fn parse_session_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter(|line| line.starts_with('\t') || line.starts_with(' '))
        .filter_map(|line| line.split_whitespace().next())
        .filter(|id| {
            id.split_once('.')
                .is_some_and(|(pid, name)| !name.is_empty() && pid.chars().all(|c| c.is_ascii_digit()))
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_list() {
        let listing = "There are screens on:\n\
                       \t4711.nangate45-test-1_a.tcl\t(10/06/2018 02:03:59 PM)\t(Detached)\n\
                       \t4712.caseA_2018-10-06_14:03:59\t(Detached)\n\
                       2 Sockets in /run/screen/S-user.\n";
        assert_eq!(
            parse_session_list(listing),
            vec![
                "4711.nangate45-test-1_a.tcl".to_string(),
                "4712.caseA_2018-10-06_14:03:59".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_session_list("No Sockets found in /run/screen/S-user.\n").is_empty());
        assert!(parse_session_list("").is_empty());
    }

    #[test]
    fn test_missing_program_is_session_failure() {
        let launcher = ScreenLauncher {
            program: "/nonexistent/screen-binary".to_string(),
            ..ScreenLauncher::default()
        };
        assert!(matches!(
            launcher.kill_all(),
            Err(HarnessError::SessionControlFailure(_))
        ));
        assert!(matches!(
            launcher.launch("caseA", "true"),
            Err(HarnessError::SessionControlFailure(_))
        ));
    }
}
