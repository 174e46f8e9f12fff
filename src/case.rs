//! Case discovery and selector resolution.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};

/// One benchmark or regression test directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub name: String,
    pub path: PathBuf,
}

impl Case {
    pub fn new(root: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: root.join(name),
        }
    }
}

/// Result of resolving a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Single(Case),
    Batch(Vec<Case>),
}

impl Selection {
    /// Always a sequence, so callers run a single loop
    pub fn into_cases(self) -> Vec<Case> {
        match self {
            Selection::Single(case) => vec![case],
            Selection::Batch(cases) => cases,
        }
    }
}

/// Sorted names of the immediate subdirectories of `root`
pub fn list_case_names(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(HarnessError::PathNotFound(root.to_path_buf()));
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Turns a user selector into concrete cases from a sorted listing
#[derive(Debug)]
pub struct CaseResolver {
    root: PathBuf,
    names: Vec<String>,
}

impl CaseResolver {
    pub fn new(root: &Path, mut names: Vec<String>) -> Self {
        names.sort();
        Self {
            root: root.to_path_buf(),
            names,
        }
    }

    pub fn scan(root: &Path) -> Result<Self> {
        Ok(Self::new(root, list_case_names(root)?))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Index, `all`, or a literal name. Unknown names resolve anyway and
    /// fail later when their inputs are collected.
    pub fn resolve(&self, selector: &str) -> Result<Selection> {
        if !selector.is_empty() && selector.bytes().all(|b| b.is_ascii_digit()) {
            let index: usize = selector.parse().map_err(|_| HarnessError::IndexOutOfRange {
                index: usize::MAX,
                len: self.names.len(),
            })?;
            let name = self.names.get(index).ok_or(HarnessError::IndexOutOfRange {
                index,
                len: self.names.len(),
            })?;
            return Ok(Selection::Single(Case::new(&self.root, name)));
        }

        if selector == "all" {
            let cases = self
                .names
                .iter()
                .map(|name| Case::new(&self.root, name))
                .collect();
            return Ok(Selection::Batch(cases));
        }

        Ok(Selection::Single(Case::new(&self.root, selector)))
    }

    /// Usage text listing every discoverable case with its index
    pub fn usage(&self, program: &str) -> String {
        let mut text = format!("usage:   {} <benchname | number | all>\n", program);
        text.push_str("Example:\n");
        text.push_str(&format!("         {} 0\n", program));
        text.push_str(&format!("         {} all\n", program));
        text.push_str(&format!("         {} --mode detached all\n", program));
        text.push_str(&format!("         {} --kill-sessions\n", program));
        text.push_str("Options:\n");
        text.push_str("   --mode direct|instrumented|detached   how each case is run (default direct)\n");
        text.push_str("   --dry-run                             echo commands without running them\n");
        text.push_str("   --kill-sessions                       quit every detached session, then exit\n");
        if self.names.is_empty() {
            text.push_str(&format!(
                "No cases found under {}\n",
                self.root.display()
            ));
        } else {
            text.push_str("Cases:\n");
            for (index, name) in self.names.iter().enumerate() {
                text.push_str(&format!("   {:>3}  {}\n", index, name));
            }
        }
        text
    }
}
