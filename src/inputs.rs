//! Collects a case directory's input files into flag fragments.

use std::fs;
use std::path::{Path, PathBuf};

use crate::case::Case;
use crate::command::quote_path;
use crate::error::{HarnessError, Result};

/// Restricts which files of an extension belong to a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameFilter {
    Any,
    StemContains(&'static str),
    StemExcludes(&'static str),
}

impl NameFilter {
    fn accepts(&self, stem: &str) -> bool {
        match self {
            NameFilter::Any => true,
            NameFilter::StemContains(needle) => stem.contains(needle),
            NameFilter::StemExcludes(needle) => !stem.contains(needle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// A single required file; zero or several is an anomaly
    ExactlyOne,
    /// Any number of files, each rendered as its own flag
    Repeated,
}

/// An (extension, flag) pair describing one slice of the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputGroup {
    pub flag: &'static str,
    pub extension: &'static str,
    pub filter: NameFilter,
    pub cardinality: Cardinality,
}

impl InputGroup {
    pub const fn required(flag: &'static str, extension: &'static str, filter: NameFilter) -> Self {
        Self {
            flag,
            extension,
            filter,
            cardinality: Cardinality::ExactlyOne,
        }
    }

    pub const fn repeated(flag: &'static str, extension: &'static str) -> Self {
        Self {
            flag,
            extension,
            filter: NameFilter::Any,
            cardinality: Cardinality::Repeated,
        }
    }
}

/// Input files every benchmark case must provide
pub const BENCHMARK_INPUTS: [InputGroup; 4] = [
    InputGroup::required("-tech_lef", "lef", NameFilter::StemContains("tech")),
    InputGroup::required("-cell_lef", "lef", NameFilter::StemExcludes("tech")),
    InputGroup::required("-input_def", "def", NameFilter::Any),
    InputGroup::required("-placement_constraints", "constraints", NameFilter::Any),
];

/// Immediate files in `dir` named `*.<extension>` (case-sensitive), sorted
pub fn collect(dir: &Path, extension: &str, filter: NameFilter) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(HarnessError::PathNotFound(dir.to_path_buf()));
    }

    let suffix = format!(".{}", extension);
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(stem) = name.strip_suffix(&suffix) else {
            continue;
        };
        if stem.is_empty() || !filter.accepts(stem) {
            continue;
        }
        files.push(entry.path());
    }
    files.sort();
    Ok(files)
}

/// `flag <path>` per file with the path shell-quoted, space-joined; empty for no files
pub fn render_fragment(flag: &str, files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|path| format!("{} {}", flag, quote_path(path)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Renders every group for `case`, in group order
pub fn collect_fragments(case: &Case, groups: &[InputGroup]) -> Result<Vec<String>> {
    let dir = absolute(&case.path)?;
    if !dir.is_dir() {
        return Err(HarnessError::PathNotFound(case.path.clone()));
    }

    let mut matched = Vec::with_capacity(groups.len());
    for group in groups {
        matched.push(collect(&dir, group.extension, group.filter)?);
    }

    if !groups.is_empty() && matched.iter().all(|files| files.is_empty()) {
        return Err(HarnessError::EmptyInputSet {
            case: case.name.clone(),
            path: case.path.clone(),
        });
    }

    let mut fragments = Vec::with_capacity(groups.len());
    for (group, files) in groups.iter().zip(&matched) {
        if group.cardinality == Cardinality::ExactlyOne && files.len() != 1 {
            return Err(HarnessError::MultipleOrMissingFile {
                case: case.name.clone(),
                flag: group.flag.to_string(),
                extension: group.extension.to_string(),
                found: files.len(),
            });
        }
        let fragment = render_fragment(group.flag, files);
        if !fragment.is_empty() {
            fragments.push(fragment);
        }
    }
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    fn benchmark_case(dir: &TempDir, name: &str) -> Case {
        let case = Case::new(dir.path(), name);
        fs::create_dir_all(&case.path).unwrap();
        for file in ["tech.lef", "cells_modified.lef", "placed.def", "placement.constraints"] {
            touch(&case.path, file);
        }
        case
    }

    #[test]
    fn test_collect_is_sorted_and_non_recursive() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.def");
        touch(dir.path(), "a.def");
        touch(dir.path(), "c.DEF");
        touch(dir.path(), "notdef");
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "d.def");

        let files = collect(dir.path(), "def", NameFilter::Any).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.def", "b.def"]);
    }

    #[test]
    fn test_render_fragment() {
        let files = vec![PathBuf::from("/x/a.def"), PathBuf::from("/x/b.def")];
        assert_eq!(render_fragment("-def", &files), "-def /x/a.def -def /x/b.def");
        assert_eq!(render_fragment("-def", &[]), "");
        assert_eq!(
            render_fragment("-def", &[PathBuf::from("/des perf/placed.def")]),
            "-def '/des perf/placed.def'"
        );
    }

    #[test]
    fn test_benchmark_fragments_are_stable() {
        let dir = TempDir::new().unwrap();
        let case = benchmark_case(&dir, "caseA");

        let first = collect_fragments(&case, &BENCHMARK_INPUTS).unwrap();
        let second = collect_fragments(&case, &BENCHMARK_INPUTS).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert!(first[0].starts_with("-tech_lef "));
        assert!(first[0].ends_with("tech.lef"));
        assert!(first[1].ends_with("cells_modified.lef"));
        assert!(first[2].ends_with("placed.def"));
        assert!(first[3].ends_with("placement.constraints"));
    }

    #[test]
    fn test_duplicate_required_file() {
        let dir = TempDir::new().unwrap();
        let case = benchmark_case(&dir, "caseA");
        touch(&case.path, "other.def");

        match collect_fragments(&case, &BENCHMARK_INPUTS) {
            Err(HarnessError::MultipleOrMissingFile { flag, found, .. }) => {
                assert_eq!(flag, "-input_def");
                assert_eq!(found, 2);
            }
            other => panic!("expected MultipleOrMissingFile, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_file() {
        let dir = TempDir::new().unwrap();
        let case = benchmark_case(&dir, "caseA");
        fs::remove_file(case.path.join("placement.constraints")).unwrap();

        assert!(matches!(
            collect_fragments(&case, &BENCHMARK_INPUTS),
            Err(HarnessError::MultipleOrMissingFile { found: 0, .. })
        ));
    }

    #[test]
    fn test_missing_and_empty_cases() {
        let dir = TempDir::new().unwrap();
        let missing = Case::new(dir.path(), "caseC");
        assert!(matches!(
            collect_fragments(&missing, &BENCHMARK_INPUTS),
            Err(HarnessError::PathNotFound(_))
        ));

        let empty = Case::new(dir.path(), "empty");
        fs::create_dir(&empty.path).unwrap();
        assert!(matches!(
            collect_fragments(&empty, &BENCHMARK_INPUTS),
            Err(HarnessError::EmptyInputSet { .. })
        ));
    }

    #[test]
    fn test_repeated_group_allows_empty() {
        let dir = TempDir::new().unwrap();
        let case = Case::new(dir.path(), "caseA");
        fs::create_dir(&case.path).unwrap();
        touch(&case.path, "a.v");

        let groups = [InputGroup::repeated("-verilog", "v"), InputGroup::repeated("-sdc", "sdc")];
        let fragments = collect_fragments(&case, &groups).unwrap();
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].starts_with("-verilog "));
    }
}
