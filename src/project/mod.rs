// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Project discovery
//!
//! Finds the source units worth generating tests for, detects the project's
//! test setup, and decides where generated files land.

pub mod output;
pub mod setup;

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::{DirEntry, WalkDir};

use crate::error::{ForgeError, Result};

pub use output::{destination_for, normalize_code, test_extension};
pub use setup::{detect_test_setup, TestFramework, TestSetup, UiRenderer};

/// Extensions considered source code
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mts", "cts", "mjs", "cjs"];

/// Directory names never descended into
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "coverage",
    "out",
    "__tests__",
    "__mocks__",
];

/// One source file, read once at scan time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Path relative to the project root, `/`-separated
    pub rel_path: String,
    /// Full file text
    pub text: String,
    /// Number of lines
    pub line_count: usize,
}

impl SourceUnit {
    pub fn new(rel_path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_count = text.lines().count();
        Self {
            rel_path: rel_path.into(),
            text,
            line_count,
        }
    }
}

/// Result of walking a project
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub root: PathBuf,
    /// Sorted by `rel_path`
    pub files: Vec<SourceUnit>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| ForgeError::InvalidInput(format!("Invalid glob '{}': {}", p, e)))
        })
        .collect()
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || IGNORED_DIRS.contains(&name.as_ref())
}

/// Whether a file name looks like a source file rather than a test or declaration file
pub fn is_candidate_file(file_name: &str) -> bool {
    let Some((stem, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    if !SOURCE_EXTENSIONS.contains(&ext) {
        return false;
    }
    if stem.ends_with(".d") {
        return false;
    }
    !(stem.ends_with(".test") || stem.ends_with(".spec"))
}

/// Convert a path under `root` to a `/`-separated relative string
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

/// Walk `root` and collect candidate source units.
///
/// `include` globs, when given, must match the relative path; `exclude`
/// globs drop any file they match.
pub fn scan(root: &Path, include: &[String], exclude: &[String]) -> Result<ScanResult> {
    if !root.is_dir() {
        return Err(ForgeError::InvalidInput(format!(
            "Project directory not found: {}",
            root.display()
        )));
    }

    let include = compile_globs(include)?;
    let exclude = compile_globs(exclude)?;
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_ignored_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let file_name = entry.file_name().to_string_lossy();
        if !is_candidate_file(&file_name) {
            continue;
        }

        let Some(rel_path) = relative_path(root, entry.path()) else {
            continue;
        };

        if !include.is_empty() && !include.iter().any(|p| p.matches_with(&rel_path, options)) {
            continue;
        }
        if exclude.iter().any(|p| p.matches_with(&rel_path, options)) {
            continue;
        }

        match std::fs::read_to_string(entry.path()) {
            Ok(text) => files.push(SourceUnit::new(rel_path, text)),
            Err(e) => tracing::warn!(path = %rel_path, error = %e, "skipping unreadable file"),
        }
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    tracing::debug!(count = files.len(), root = %root.display(), "scan complete");

    Ok(ScanResult {
        root: root.to_path_buf(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_is_candidate_file() {
        assert!(is_candidate_file("math.ts"));
        assert!(is_candidate_file("Button.tsx"));
        assert!(is_candidate_file("util.mjs"));
        assert!(!is_candidate_file("math.test.ts"));
        assert!(!is_candidate_file("math.spec.tsx"));
        assert!(!is_candidate_file("types.d.ts"));
        assert!(!is_candidate_file("README.md"));
        assert!(!is_candidate_file("Makefile"));
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "src/b.ts", "export const b = 1;");
        write(root, "src/a.tsx", "export const A = () => null;");
        write(root, "src/a.test.ts", "it('x', () => {});");
        write(root, "src/__tests__/a.test.tsx", "");
        write(root, "node_modules/pkg/index.js", "module.exports = 1;");
        write(root, ".testforge/run-state.json", "{}");
        write(root, "dist/out.js", "");

        let result = scan(root, &[], &[]).unwrap();
        let paths: Vec<&str> = result.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.tsx", "src/b.ts"]);
        assert_eq!(result.files[0].line_count, 1);
    }

    #[test]
    fn test_scan_include_exclude() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "src/lib/math.ts", "export const x = 1;");
        write(root, "src/ui/View.tsx", "export const View = () => null;");
        write(root, "scripts/tool.js", "console.log(1)");

        let result = scan(root, &["src/**".to_string()], &["**/ui/**".to_string()]).unwrap();
        let paths: Vec<&str> = result.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["src/lib/math.ts"]);
    }

    #[test]
    fn test_scan_invalid_glob() {
        let temp = TempDir::new().unwrap();
        assert!(scan(temp.path(), &["[".to_string()], &[]).is_err());
    }

    #[test]
    fn test_scan_missing_root() {
        let temp = TempDir::new().unwrap();
        assert!(scan(&temp.path().join("missing"), &[], &[]).is_err());
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Path::new("/project");
        let path = root.join("src").join("a.ts");
        assert_eq!(relative_path(root, &path).as_deref(), Some("src/a.ts"));
    }
}
