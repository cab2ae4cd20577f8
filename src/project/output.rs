// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Output placement and text normalization for generated tests

use std::path::{Path, PathBuf};

/// Extensions a generated test file may carry
const TEST_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Extension for the test of `rel_path`; anything outside the known set maps to `ts`.
pub fn test_extension(rel_path: &str) -> &'static str {
    let ext = Path::new(rel_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    TEST_EXTENSIONS
        .iter()
        .find(|known| **known == ext)
        .copied()
        .unwrap_or("ts")
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Destination of the test for `rel_path`.
///
/// `<output_root>/<dir of rel_path>/<test_dir>/<basename>.test.<ext>`. When a
/// file is split into several chunks each chunk passes its declaration label,
/// giving `<basename>.<label>.test.<ext>`.
pub fn destination_for(
    output_root: &Path,
    rel_path: &str,
    label: Option<&str>,
    test_dir: &str,
) -> PathBuf {
    let rel = Path::new(rel_path);
    let dir = rel.parent().unwrap_or_else(|| Path::new(""));
    let basename = rel
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "index".to_string());
    let ext = test_extension(rel_path);

    let file_name = match label {
        Some(label) => format!("{}.{}.test.{}", basename, sanitize_label(label), ext),
        None => format!("{}.test.{}", basename, ext),
    };

    output_root.join(dir).join(test_dir).join(file_name)
}

/// Normalize generated code before it is verified or written.
pub fn normalize_code(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string();
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_extension() {
        assert_eq!(test_extension("src/a.ts"), "ts");
        assert_eq!(test_extension("src/A.tsx"), "tsx");
        assert_eq!(test_extension("src/a.jsx"), "jsx");
        assert_eq!(test_extension("src/a.mjs"), "ts");
        assert_eq!(test_extension("src/a.cts"), "ts");
    }

    #[test]
    fn test_destination_single_chunk() {
        let dest = destination_for(Path::new("/out"), "src/utils/math.ts", None, "__tests__");
        assert_eq!(dest, PathBuf::from("/out/src/utils/__tests__/math.test.ts"));
    }

    #[test]
    fn test_destination_root_file() {
        let dest = destination_for(Path::new("/out"), "index.js", None, "__tests__");
        assert_eq!(dest, PathBuf::from("/out/__tests__/index.test.js"));
    }

    #[test]
    fn test_destination_multi_chunk_embeds_label() {
        let a = destination_for(Path::new("/o"), "src/hooks.tsx", Some("useAuth"), "__tests__");
        let b = destination_for(Path::new("/o"), "src/hooks.tsx", Some("useCart"), "__tests__");
        assert_eq!(a, PathBuf::from("/o/src/__tests__/hooks.useAuth.test.tsx"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_destination_sanitizes_label() {
        let dest = destination_for(Path::new("/o"), "a.ts", Some("weird name$"), "__tests__");
        assert_eq!(dest, PathBuf::from("/o/__tests__/a.weird_name_.test.ts"));
    }

    #[test]
    fn test_normalize_code() {
        let input = "\u{feff}import x from 'y';  \r\n\r\nit('a', () => {});\t\n\n\n";
        assert_eq!(
            normalize_code(input),
            "import x from 'y';\n\nit('a', () => {});\n"
        );
    }

    #[test]
    fn test_normalize_code_adds_trailing_newline() {
        assert_eq!(normalize_code("x"), "x\n");
    }
}
