// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Import/export scanning and relative module resolution.
//!
//! Regex based so it works on files tree-sitter chokes on. Covers:
//! - `import` statements (ES modules), side-effect and dynamic imports
//! - `require()` calls (CommonJS)
//! - `export` declarations, lists, defaults and re-exports

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Extensions tried when resolving an extensionless relative import
pub const RESOLVE_EXTENSIONS: &[&str] = &[
    "", ".ts", ".tsx", ".js", ".jsx", ".mts", ".cts", ".mjs", ".cjs", ".json",
];

const INDEX_FILES: &[&str] = &["index.ts", "index.tsx", "index.js", "index.jsx"];

static IMPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*import\s+(?:type\s+)?(?:(?:\{[^}]*\}|\*\s+as\s+[\w$]+|[\w$]+)(?:\s*,\s*(?:\{[^}]*\}|\*\s+as\s+[\w$]+))?)\s+from\s+['"]([^'"]+)['"]"#,
    )
    .unwrap()
});

static IMPORT_SIDE_EFFECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*import\s+['"]([^'"]+)['"]"#).unwrap());

static IMPORT_DYNAMIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"import\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

static REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

static EXPORT_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*export\s+(?:type\s+)?\{([^}]+)\}"#).unwrap());

static EXPORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*export\s+(?:declare\s+)?(?:async\s+)?(function\*?|class|abstract\s+class|const|let|var|type|interface|enum)\s+([\w$]+)"#,
    )
    .unwrap()
});

static EXPORT_DEFAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*export\s+default\s+(?:(?:async\s+)?(?:function\*?|class)\s+([\w$]+)|([\w$]+))?"#)
        .unwrap()
});

static EXPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*export\s+(?:type\s+)?(?:\{[^}]*\}|\*(?:\s+as\s+[\w$]+)?)\s+from\s+['"]([^'"]+)['"]"#,
    )
    .unwrap()
});

/// A reference to an imported module
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportRef {
    /// The specifier as written in source
    pub raw_path: String,
    pub kind: ImportKind,
    /// 1-based line
    pub line: u32,
}

impl ImportRef {
    pub fn new(raw_path: impl Into<String>, kind: ImportKind, line: u32) -> Self {
        Self {
            raw_path: raw_path.into(),
            kind,
            line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// `./foo`, `../bar`
    Relative,
    /// npm package or node builtin
    External,
    /// `/abs/path`
    Absolute,
}

/// A reference to an exported symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportRef {
    /// Exported name; the source specifier for `export * from`
    pub name: String,
    pub kind: ExportKind,
    pub line: u32,
}

impl ExportRef {
    pub fn new(name: impl Into<String>, kind: ExportKind, line: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    Function,
    /// Class, type alias, interface or enum
    Type,
    Constant,
    Default,
    ReExport,
    Other,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Function => "function",
            ExportKind::Type => "type",
            ExportKind::Constant => "constant",
            ExportKind::Default => "default",
            ExportKind::ReExport => "re-export",
            ExportKind::Other => "other",
        }
    }
}

/// Classify an import specifier.
pub fn classify_import(path: &str) -> ImportKind {
    if path.starts_with("./") || path.starts_with("../") || path == "." || path == ".." {
        ImportKind::Relative
    } else if path.starts_with('/') {
        ImportKind::Absolute
    } else {
        ImportKind::External
    }
}

fn line_number(content: &str, byte_offset: usize) -> u32 {
    content[..byte_offset].matches('\n').count() as u32 + 1
}

/// Module specifiers imported by `content`, deduplicated in discovery order.
pub fn parse_imports(content: &str) -> Vec<ImportRef> {
    let mut imports = Vec::new();
    let mut seen = HashSet::new();

    for regex in [&*IMPORT_FROM, &*IMPORT_SIDE_EFFECT, &*IMPORT_DYNAMIC, &*REQUIRE] {
        for cap in regex.captures_iter(content) {
            if let Some(path_match) = cap.get(1) {
                let path = path_match.as_str().to_string();
                if seen.insert(path.clone()) {
                    let kind = classify_import(&path);
                    let line = line_number(content, path_match.start());
                    imports.push(ImportRef::new(path, kind, line));
                }
            }
        }
    }

    imports
}

/// Exported symbols of `content`, sorted by line.
pub fn parse_exports(content: &str) -> Vec<ExportRef> {
    let mut exports = Vec::new();

    let re_export_lines: HashSet<u32> = EXPORT_FROM
        .captures_iter(content)
        .filter_map(|cap| cap.get(0))
        .map(|m| line_number(content, m.start() + m.as_str().len() - m.as_str().trim_start().len()))
        .collect();

    for cap in EXPORT_LIST.captures_iter(content) {
        if let Some(names_match) = cap.get(1) {
            let line = line_number(content, names_match.start());
            let kind = if re_export_lines.contains(&line) {
                ExportKind::ReExport
            } else {
                ExportKind::Other
            };
            for name in names_match.as_str().split(',') {
                let name = name.trim().trim_start_matches("type ").trim();
                // `x as y` exports `y`
                let export_name = match name.find(" as ") {
                    Some(pos) => name[pos + 4..].trim(),
                    None => name,
                };
                if !export_name.is_empty() {
                    exports.push(ExportRef::new(export_name, kind, line));
                }
            }
        }
    }

    for cap in EXPORT_DECL.captures_iter(content) {
        if let (Some(kind_match), Some(name_match)) = (cap.get(1), cap.get(2)) {
            let line = line_number(content, name_match.start());
            let keyword = kind_match.as_str();
            let kind = if keyword.starts_with("function") {
                ExportKind::Function
            } else if matches!(keyword, "const" | "let" | "var") {
                ExportKind::Constant
            } else {
                ExportKind::Type
            };
            exports.push(ExportRef::new(name_match.as_str(), kind, line));
        }
    }

    for cap in EXPORT_DEFAULT.captures_iter(content) {
        let Some(whole) = cap.get(0) else { continue };
        let line = line_number(content, whole.end().saturating_sub(1).max(whole.start()));
        let name = cap
            .get(1)
            .or(cap.get(2))
            .map(|m| m.as_str())
            .filter(|n| !matches!(*n, "function" | "class" | "async"))
            .unwrap_or("default");
        exports.push(ExportRef::new(name, ExportKind::Default, line));
    }

    for cap in EXPORT_FROM.captures_iter(content) {
        let (Some(whole), Some(path_match)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        // Named re-exports were already listed by name above
        if whole.as_str().contains('*') {
            let line = line_number(content, path_match.start());
            exports.push(ExportRef::new(path_match.as_str(), ExportKind::ReExport, line));
        }
    }

    exports.sort_by_key(|e| e.line);
    exports
}

/// Join a relative specifier onto `from_dir`, normalizing `.` and `..`.
pub fn join_specifier(from_dir: &Path, specifier: &str) -> PathBuf {
    let mut resolved = from_dir.to_path_buf();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            segment => resolved.push(segment),
        }
    }
    resolved
}

/// Resolve a relative specifier to an existing file on disk.
///
/// Tries the path as written, then with each known extension, then as a
/// directory with an index file.
pub fn resolve_relative(from_dir: &Path, specifier: &str) -> Option<PathBuf> {
    if classify_import(specifier) != ImportKind::Relative {
        return None;
    }
    let base = join_specifier(from_dir, specifier);

    for ext in RESOLVE_EXTENSIONS {
        let candidate = if ext.is_empty() {
            base.clone()
        } else {
            PathBuf::from(format!("{}{}", base.display(), ext))
        };
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    // `./util.js` written for a `util.ts` source
    if let Some(stem) = specifier.strip_suffix(".js") {
        let ts = join_specifier(from_dir, &format!("{}.ts", stem));
        if ts.is_file() {
            return Some(ts);
        }
        let tsx = join_specifier(from_dir, &format!("{}.tsx", stem));
        if tsx.is_file() {
            return Some(tsx);
        }
    }

    INDEX_FILES
        .iter()
        .map(|index| base.join(index))
        .find(|p| p.is_file())
}

/// Specifier that imports `target` from a file in `from_dir`, extension dropped.
///
/// Both paths are compared lexically so they must share a base.
pub fn relative_specifier(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let stem = target.with_extension("");
    let to: Vec<Component<'_>> = stem.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{}", joined)
    }
}
