// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! TypeScript/JavaScript syntax helpers
//!
//! Thin layer over tree-sitter shared by the chunker, the verifier and the
//! agent's introspection tools. Everything here is read-only analysis of
//! text; nothing touches the filesystem except module resolution.

pub mod declarations;
pub mod modules;

use tree_sitter::{Node, Parser, Tree};

use crate::error::{ForgeError, Result};

pub use declarations::{top_level_declarations, Declaration, DeclarationKind};
pub use modules::{
    classify_import, parse_exports, parse_imports, relative_specifier, resolve_relative, ExportKind,
    ExportRef, ImportKind, ImportRef,
};

/// Grammar flavour used to parse a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Plain TypeScript (`.ts`, `.mts`, `.cts`)
    TypeScript,
    /// TypeScript with JSX; also used for JavaScript files
    Tsx,
}

impl Dialect {
    /// Pick the grammar for a path by extension
    pub fn for_path(path: &str) -> Self {
        let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        match ext {
            "ts" | "mts" | "cts" => Dialect::TypeScript,
            _ => Dialect::Tsx,
        }
    }

    fn language(&self) -> tree_sitter::Language {
        match self {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Parse `source` with the grammar for `dialect`.
pub fn parse(source: &str, dialect: Dialect) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&dialect.language())
        .map_err(|e| ForgeError::Planning(format!("Failed to load grammar: {}", e)))?;
    parser
        .parse(source, None)
        .ok_or_else(|| ForgeError::Planning("Parser returned no tree".to_string()))
}

/// Text of a node, empty on invalid UTF-8 boundaries
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// All direct children of a node
pub fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Direct named children of a node
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Depth-first pre-order visit of every node under `root`
pub fn visit<'t>(root: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        f(node);
        let mut kids = children(node);
        kids.reverse();
        stack.extend(kids);
    }
}

/// 1-based line of a node's start
pub fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// A syntax problem found in a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxProblem {
    pub line: usize,
    pub column: usize,
    pub missing: Option<String>,
    pub snippet: String,
}

/// Collect ERROR and MISSING nodes, outermost only.
pub fn syntax_problems(tree: &Tree, source: &str) -> Vec<SyntaxProblem> {
    let mut problems = Vec::new();
    if !tree.root_node().has_error() {
        return problems;
    }

    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            let snippet: String = node_text(node, source)
                .lines()
                .next()
                .unwrap_or("")
                .chars()
                .take(40)
                .collect();
            problems.push(SyntaxProblem {
                line: pos.row + 1,
                column: pos.column + 1,
                missing: node.is_missing().then(|| node.kind().to_string()),
                snippet,
            });
            continue;
        }
        if node.has_error() {
            let mut kids = children(node);
            kids.reverse();
            stack.extend(kids);
        }
    }

    problems
}

/// Remove every comment from `source`.
///
/// Falls back to the input when it cannot be parsed.
pub fn strip_comments(source: &str, dialect: Dialect) -> String {
    let Ok(tree) = parse(source, dialect) else {
        return source.to_string();
    };

    let mut ranges = Vec::new();
    visit(tree.root_node(), &mut |node| {
        if node.kind() == "comment" {
            ranges.push(node.byte_range());
        }
    });

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for range in ranges {
        if range.start >= last {
            out.push_str(&source[last..range.start]);
            last = range.end;
        }
    }
    out.push_str(&source[last..]);
    out
}

/// Collapse indentation and blank lines. Lossy; used only to squeeze prompts.
pub fn collapse_whitespace(source: &str) -> String {
    source
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether a file contains only type-level declarations.
///
/// Imports, comments, `declare` blocks and type re-exports are allowed
/// alongside at least one type alias or interface; anything executable makes
/// the file testable.
pub fn is_types_only(source: &str, dialect: Dialect) -> bool {
    let Ok(tree) = parse(source, dialect) else {
        return false;
    };
    let root = tree.root_node();
    let mut saw_type = false;

    for node in named_children(root) {
        match node.kind() {
            "comment" | "import_statement" | "ambient_declaration" | "empty_statement" => {}
            "type_alias_declaration" | "interface_declaration" => saw_type = true,
            "export_statement" => match node.child_by_field_name("declaration") {
                Some(decl)
                    if matches!(
                        decl.kind(),
                        "type_alias_declaration" | "interface_declaration"
                    ) =>
                {
                    saw_type = true
                }
                Some(_) => return false,
                None => {
                    // `export type { A } from './a'` and `export { type A }`
                    let text = node_text(node, source);
                    let is_type_export = text.trim_start_matches("export").trim_start().starts_with("type")
                        || (text.contains('{')
                            && node.child_by_field_name("value").is_none()
                            && text
                                .split(['{', '}'])
                                .nth(1)
                                .map(|inner| {
                                    inner
                                        .split(',')
                                        .map(str::trim)
                                        .filter(|s| !s.is_empty())
                                        .all(|s| s.starts_with("type "))
                                })
                                .unwrap_or(false));
                    if !is_type_export {
                        return false;
                    }
                }
            },
            _ => return false,
        }
    }

    saw_type
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_for_path() {
        assert_eq!(Dialect::for_path("a.ts"), Dialect::TypeScript);
        assert_eq!(Dialect::for_path("a.cts"), Dialect::TypeScript);
        assert_eq!(Dialect::for_path("A.tsx"), Dialect::Tsx);
        assert_eq!(Dialect::for_path("a.js"), Dialect::Tsx);
        assert_eq!(Dialect::for_path("a.jsx"), Dialect::Tsx);
    }

    #[test]
    fn test_parse_valid_source() {
        let tree = parse("export const add = (a: number, b: number) => a + b;", Dialect::TypeScript)
            .unwrap();
        assert_eq!(tree.root_node().kind(), "program");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_syntax_problems_reports_line() {
        let source = "const a = 1;\nfunction broken( {\n";
        let tree = parse(source, Dialect::TypeScript).unwrap();
        let problems = syntax_problems(&tree, source);
        assert!(!problems.is_empty());
        assert!(problems.iter().all(|p| p.line >= 2));
    }

    #[test]
    fn test_syntax_problems_clean() {
        let source = "it('works', () => { expect(1).toBe(1); });";
        let tree = parse(source, Dialect::TypeScript).unwrap();
        assert!(syntax_problems(&tree, source).is_empty());
    }

    #[test]
    fn test_strip_comments() {
        let source = "// header\nconst a = 1; /* inline */\n/** doc */\nfunction f() {}\n";
        let stripped = strip_comments(source, Dialect::TypeScript);
        assert!(!stripped.contains("header"));
        assert!(!stripped.contains("inline"));
        assert!(!stripped.contains("doc"));
        assert!(stripped.contains("const a = 1;"));
        assert!(stripped.contains("function f() {}"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(
            collapse_whitespace("function f() {\n\n    return   1;\n}\n"),
            "function f() {\nreturn 1;\n}"
        );
    }

    #[test]
    fn test_is_types_only() {
        let source = "import type { A } from './a';\n// comment\nexport type B = A | null;\nexport interface C { b: B }\n";
        assert!(is_types_only(source, Dialect::TypeScript));
    }

    #[test]
    fn test_is_types_only_type_reexport() {
        let source = "export type { A } from './a';\nexport interface C { x: number }\n";
        assert!(is_types_only(source, Dialect::TypeScript));
    }

    #[test]
    fn test_is_not_types_only_with_function() {
        let source = "export type B = string;\nexport function f(): B { return ''; }\n";
        assert!(!is_types_only(source, Dialect::TypeScript));
    }

    #[test]
    fn test_is_not_types_only_with_enum() {
        let source = "export interface A {}\nexport enum E { X }\n";
        assert!(!is_types_only(source, Dialect::TypeScript));
    }

    #[test]
    fn test_is_not_types_only_imports_only() {
        assert!(!is_types_only("import './polyfill';\n", Dialect::TypeScript));
    }
}
