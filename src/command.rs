//! Renders the external tool invocation for one case.

use std::path::{Path, PathBuf};

use crate::case::Case;
use crate::config::{HarnessConfig, RunStamp};
use crate::error::Result;
use crate::inputs::{self, InputGroup};

/// Memory checker prefix; `--log-fd=1` folds its report into the tee'd stream
pub const MEMCHECK_PREFIX: &str = "valgrind --log-fd=1";

/// One fully assembled command line for one case in one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Session name, unique within a batch
    pub name: String,
    /// Directory the command changes into first, if any
    pub workdir: Option<PathBuf>,
    /// Tool command without redirection
    pub body: String,
    /// Combined stdout/stderr capture for ordinary runs
    pub log: PathBuf,
    /// Capture target when running under the memory checker
    pub memcheck_log: PathBuf,
    /// Placed layout the tool is asked to write, if any
    pub output: Option<PathBuf>,
}

impl Invocation {
    fn prefix(&self) -> String {
        match &self.workdir {
            Some(dir) => format!("cd {} && ", quote_path(dir)),
            None => String::new(),
        }
    }

    /// Shell line for a plain run, teeing console output into the log
    pub fn command_line(&self) -> String {
        format!("{}{{ {}; }} |& tee {}", self.prefix(), self.body, quote_path(&self.log))
    }

    /// Shell line for a run under the memory checker
    pub fn memcheck_line(&self) -> String {
        format!(
            "{}{{ {} {}; }} |& tee {}",
            self.prefix(),
            MEMCHECK_PREFIX,
            self.body,
            quote_path(&self.memcheck_log)
        )
    }

    /// Directory that must exist before the log can be written
    pub fn log_dir(&self) -> Option<PathBuf> {
        let parent = self.log.parent()?;
        Some(match &self.workdir {
            Some(dir) if parent.is_relative() => dir.join(parent),
            _ => parent.to_path_buf(),
        })
    }
}

/// Single-quote `arg` for bash unless it is made only of safe characters
pub fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let safe = arg.chars().all(|ch| {
        matches!(
            ch,
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' | '/' | ':' | '@' | '+' | '=' | ','
        )
    });
    if safe {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "'\"'\"'"))
}

pub fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

pub fn output_path(output_dir: &Path, case: &str, stamp: &RunStamp) -> PathBuf {
    output_dir.join(format!("{}_{}.def", case, stamp))
}

pub fn log_path(log_dir: &Path, case: &str, stamp: &RunStamp) -> PathBuf {
    log_dir.join(format!("{}_{}_out.log", case, stamp))
}

pub fn memcheck_log_path(log_dir: &Path, case: &str, stamp: &RunStamp) -> PathBuf {
    log_dir.join(format!("{}_{}_valgrind.log", case, stamp))
}

/// Builds benchmark invocations for every case of one run
#[derive(Debug)]
pub struct CommandBuilder<'a> {
    config: &'a HarnessConfig,
    groups: &'a [InputGroup],
}

impl<'a> CommandBuilder<'a> {
    pub fn new(config: &'a HarnessConfig, groups: &'a [InputGroup]) -> Self {
        Self { config, groups }
    }

    /// Render from fragments already collected for `case`
    pub fn render(&self, case: &Case, fragments: &[String]) -> Invocation {
        let stamp = &self.config.stamp;
        let output = output_path(&self.config.output_dir, &case.name, stamp);

        let mut parts = Vec::with_capacity(fragments.len() + 3);
        parts.push(quote_path(&self.config.binary));
        parts.extend(fragments.iter().filter(|f| !f.is_empty()).cloned());
        parts.push(format!("-cpu {}", self.config.threads));
        parts.push(format!("-output_def {}", quote_path(&output)));

        Invocation {
            name: format!("{}_{}", case.name, stamp),
            workdir: None,
            body: parts.join(" "),
            log: log_path(&self.config.log_dir, &case.name, stamp),
            memcheck_log: memcheck_log_path(&self.config.log_dir, &case.name, stamp),
            output: Some(output),
        }
    }

    /// Collect the case's inputs and render its invocation
    pub fn build(&self, case: &Case) -> Result<Invocation> {
        let fragments = inputs::collect_fragments(case, self.groups)?;
        Ok(self.render(case, &fragments))
    }
}

/// Invocation that feeds one script file to the tool on stdin, run from
/// inside the case directory with logs under `<case>/<results_dir>/`
pub fn script_invocation(case: &Case, binary: &str, script: &str, results_dir: &str) -> Invocation {
    let results = Path::new(results_dir);
    Invocation {
        name: format!("{}_{}", case.name, script),
        workdir: Some(case.path.clone()),
        body: format!("{} < {}", shell_quote(binary), shell_quote(script)),
        log: results.join(format!("{}.log", script)),
        memcheck_log: results.join(format!("{}_valgrind.log", script)),
        output: None,
    }
}
