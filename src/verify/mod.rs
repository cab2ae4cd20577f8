// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Static verification of generated test files
//!
//! A candidate is checked on its own, without the project's type graph:
//! - syntax errors from the parser
//! - calls to names that are declared nowhere and are not ambient
//! - relative imports that do not resolve on disk from the destination
//!
//! Bare package imports that cannot be found are reported but filtered out
//! as noise, since the project's dependency graph is not rebuilt here.

pub mod ambient;
pub mod cleanup;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::{Node, Tree};

pub use ambient::{AmbientEnvironment, AMBIENT_VERSION};
pub use cleanup::{cleanup, CleanupReport};

use crate::project::normalize_code;
use crate::syntax::{self, node_text, Dialect, ImportKind};

/// Lexical test-case pattern: `it(`, `test(`, `it.only(`, `test.each(` ...
static TEST_CASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|[^.\w$])(?:it|test)(?:\.(?:only|concurrent|each|skip|todo))?\s*\(")
        .unwrap()
});

/// Diagnostic classes dropped before results are reported
pub const IGNORED_DIAGNOSTIC_CLASSES: &[DiagnosticClass] =
    &[DiagnosticClass::UnresolvedExternalModule];

/// Names every script can use without declaring them
const LANGUAGE_NAMES: &[&str] = &["undefined", "NaN", "Infinity", "arguments", "super", "this"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticClass {
    Syntax,
    UndeclaredName,
    UnresolvedRelativeModule,
    UnresolvedExternalModule,
}

impl DiagnosticClass {
    pub fn is_ignored(&self) -> bool {
        IGNORED_DIAGNOSTIC_CLASSES.contains(self)
    }
}

/// A single verifier finding, formatted like a compiler diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub class: DiagnosticClass,
    /// TypeScript-style code, e.g. `TS2304`
    pub code: &'static str,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (line {}:{}): {}",
            self.code, self.line, self.column, self.message
        )
    }
}

/// Result of verifying one candidate
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    /// Normalized and cleaned code, as it should be written
    pub normalized_code: String,
    /// Reported diagnostics, ignored classes already removed
    pub diagnostics: Vec<Diagnostic>,
    /// Number of diagnostics dropped as noise
    pub suppressed: usize,
    pub test_case_count: usize,
    pub cleanup: CleanupReport,
}

impl VerifyOutcome {
    pub fn diagnostic_messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.to_string()).collect()
    }

    /// Passing means no diagnostics and at least one test case
    pub fn passed(&self) -> bool {
        self.diagnostics.is_empty() && self.test_case_count > 0
    }
}

/// Count `it(`/`test(` call sites
pub fn count_test_cases(code: &str) -> usize {
    TEST_CASE.find_iter(code).count()
}

/// Isolated static checker seeded with an ambient environment
#[derive(Debug, Clone)]
pub struct Verifier {
    ambient: AmbientEnvironment,
}

impl Verifier {
    pub fn new(ambient: AmbientEnvironment) -> Self {
        Self { ambient }
    }

    pub fn ambient(&self) -> &AmbientEnvironment {
        &self.ambient
    }

    /// Normalize, clean up and check `candidate` as if written to `destination`.
    pub fn verify(&self, candidate: &str, destination: &Path) -> VerifyOutcome {
        let dialect = Dialect::for_path(&destination.to_string_lossy());
        let normalized = normalize_code(candidate);
        let (cleaned, cleanup_report) = cleanup::cleanup(&normalized, dialect);
        // Cleanup rebuilds statements, so normalize again
        let final_code = normalize_code(&cleaned);

        let all = match syntax::parse(&final_code, dialect) {
            Ok(tree) => self.check(&tree, &final_code, destination),
            Err(e) => vec![Diagnostic {
                class: DiagnosticClass::Syntax,
                code: "TS1005",
                line: 1,
                column: 1,
                message: e.to_string(),
            }],
        };

        let (ignored, diagnostics): (Vec<_>, Vec<_>) =
            all.into_iter().partition(|d| d.class.is_ignored());
        if !ignored.is_empty() {
            tracing::debug!(suppressed = ignored.len(), "ignoring external module diagnostics");
        }

        VerifyOutcome {
            test_case_count: count_test_cases(&final_code),
            normalized_code: final_code,
            diagnostics,
            suppressed: ignored.len(),
            cleanup: cleanup_report,
        }
    }

    fn check(&self, tree: &Tree, source: &str, destination: &Path) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = syntax::syntax_problems(tree, source)
            .into_iter()
            .map(|p| match p.missing {
                Some(token) => Diagnostic {
                    class: DiagnosticClass::Syntax,
                    code: "TS1005",
                    line: p.line,
                    column: p.column,
                    message: format!("'{}' expected.", token),
                },
                None => Diagnostic {
                    class: DiagnosticClass::Syntax,
                    code: "TS1109",
                    line: p.line,
                    column: p.column,
                    message: format!("Unexpected syntax near '{}'.", p.snippet),
                },
            })
            .collect();

        let dest_dir = destination.parent().unwrap_or_else(|| Path::new("."));
        diagnostics.extend(module_diagnostics(source, dest_dir));
        diagnostics.extend(self.undeclared_names(tree, source));

        diagnostics.sort_by_key(|d| (d.line, d.column));
        diagnostics
    }

    fn undeclared_names(&self, tree: &Tree, source: &str) -> Vec<Diagnostic> {
        let declared = declared_names(tree.root_node(), source);
        let mut reported = HashSet::new();
        let mut out = Vec::new();

        syntax::visit(tree.root_node(), &mut |node| {
            let callee = match node.kind() {
                "call_expression" => node.child_by_field_name("function"),
                "new_expression" => node.child_by_field_name("constructor"),
                "jsx_opening_element" | "jsx_self_closing_element" => node
                    .child_by_field_name("name")
                    .filter(|n| {
                        node_text(*n, source)
                            .chars()
                            .next()
                            .is_some_and(|c| c.is_ascii_uppercase())
                    }),
                _ => None,
            };
            let Some(callee) = callee.filter(|c| c.kind() == "identifier") else {
                return;
            };
            let name = node_text(callee, source);
            if declared.contains(name)
                || self.ambient.declares(name)
                || LANGUAGE_NAMES.contains(&name)
                || !reported.insert(name.to_string())
            {
                return;
            }
            out.push(Diagnostic {
                class: DiagnosticClass::UndeclaredName,
                code: "TS2304",
                line: syntax::line_of(callee),
                column: callee.start_position().column + 1,
                message: format!("Cannot find name '{}'.", name),
            });
        });

        out
    }
}

fn module_diagnostics(source: &str, dest_dir: &Path) -> Vec<Diagnostic> {
    syntax::parse_imports(source)
        .into_iter()
        .filter_map(|import| match import.kind {
            ImportKind::Relative => {
                syntax::modules::resolve_relative(dest_dir, &import.raw_path)
                    .is_none()
                    .then(|| Diagnostic {
                        class: DiagnosticClass::UnresolvedRelativeModule,
                        code: "TS2307",
                        line: import.line as usize,
                        column: 1,
                        message: format!(
                            "Cannot find module '{}' or its corresponding type declarations.",
                            import.raw_path
                        ),
                    })
            }
            ImportKind::External | ImportKind::Absolute => {
                (!package_installed(dest_dir, &import.raw_path)).then(|| Diagnostic {
                    class: DiagnosticClass::UnresolvedExternalModule,
                    code: "TS2307",
                    line: import.line as usize,
                    column: 1,
                    message: format!("Cannot find module '{}'.", import.raw_path),
                })
            }
        })
        .collect()
}

/// Whether a bare specifier is installed in any enclosing `node_modules`
fn package_installed(from_dir: &Path, specifier: &str) -> bool {
    if specifier.starts_with("node:") {
        return true;
    }
    let mut segments = specifier.split('/');
    let package = match (segments.next(), segments.next()) {
        (Some(scope), Some(name)) if scope.starts_with('@') => format!("{}/{}", scope, name),
        (Some(name), _) => name.to_string(),
        _ => return false,
    };
    from_dir
        .ancestors()
        .any(|dir| dir.join("node_modules").join(&package).exists())
}

/// Every name bound anywhere in the file, ignoring scope
fn declared_names<'s>(root: Node<'_>, source: &'s str) -> HashSet<&'s str> {
    let mut names = HashSet::new();

    syntax::visit(root, &mut |node| {
        let binding = match node.kind() {
            "variable_declarator" => node.child_by_field_name("name"),
            "function_declaration"
            | "generator_function_declaration"
            | "function_expression"
            | "class_declaration"
            | "abstract_class_declaration"
            | "class"
            | "enum_declaration" => node.child_by_field_name("name"),
            "required_parameter" | "optional_parameter" => node.child_by_field_name("pattern"),
            "arrow_function" => node.child_by_field_name("parameter"),
            "catch_clause" => node.child_by_field_name("parameter"),
            "for_in_statement" => node.child_by_field_name("left"),
            "import_specifier" => node
                .child_by_field_name("alias")
                .or_else(|| node.child_by_field_name("name")),
            "import_clause" | "namespace_import" => {
                for child in syntax::named_children(node) {
                    if child.kind() == "identifier" {
                        names.insert(node_text(child, source));
                    }
                }
                None
            }
            _ => None,
        };
        if let Some(binding) = binding {
            collect_pattern_names(binding, source, &mut names);
        }
    });

    names
}

fn collect_pattern_names<'s>(node: Node<'_>, source: &'s str, names: &mut HashSet<&'s str>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            names.insert(node_text(node, source));
        }
        // `{ key: value }` binds only the value side
        "pair_pattern" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect_pattern_names(value, source, names);
            }
        }
        // `a = default` binds only the left side
        "assignment_pattern" | "object_assignment_pattern" => {
            if let Some(left) = node.child_by_field_name("left") {
                collect_pattern_names(left, source, names);
            }
        }
        _ => {
            for child in syntax::named_children(node) {
                collect_pattern_names(child, source, names);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::TestFramework;
    use std::fs;
    use tempfile::TempDir;

    fn vitest() -> Verifier {
        Verifier::new(AmbientEnvironment::for_framework(TestFramework::Vitest))
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/__tests__")).unwrap();
        fs::write(dir.path().join("src/math.ts"), "export const add = (a: number, b: number) => a + b;\n").unwrap();
        dir
    }

    #[test]
    fn test_clean_candidate_passes() {
        let dir = project();
        let dest = dir.path().join("src/__tests__/math.test.ts");
        let candidate = "import { describe, it, expect } from 'vitest';\r\nimport { add } from '../math';\r\n\r\ndescribe('add', () => {\r\n  it('adds', () => {\r\n    expect(add(1, 2)).toBe(3);\r\n  });\r\n  test('zero', () => expect(add(0, 0)).toBe(0));\r\n});";
        let outcome = vitest().verify(candidate, &dest);

        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        assert_eq!(outcome.test_case_count, 2);
        assert!(outcome.passed());
        assert!(!outcome.normalized_code.contains('\r'));
        assert!(outcome.normalized_code.ends_with("});\n"));
        // vitest is not installed in the fixture
        assert_eq!(outcome.suppressed, 1);
    }

    #[test]
    fn test_syntax_error_reported() {
        let dir = project();
        let dest = dir.path().join("src/__tests__/math.test.ts");
        let outcome = vitest().verify("it('x', () => {\n  expect(1).toBe(1);\n", &dest);
        assert!(!outcome.diagnostics.is_empty());
        assert_eq!(outcome.diagnostics[0].class, DiagnosticClass::Syntax);
        assert!(!outcome.passed());
    }

    #[test]
    fn test_undeclared_call_reported_once() {
        let dir = project();
        let dest = dir.path().join("src/__tests__/math.test.ts");
        let candidate = "it('x', () => {\n  expect(multiply(2, 3)).toBe(6);\n  expect(multiply(1, 1)).toBe(1);\n});\n";
        let outcome = vitest().verify(candidate, &dest);
        assert_eq!(outcome.diagnostics.len(), 1);
        let d = &outcome.diagnostics[0];
        assert_eq!(d.class, DiagnosticClass::UndeclaredName);
        assert_eq!(d.to_string(), "TS2304 (line 2:10): Cannot find name 'multiply'.");
    }

    #[test]
    fn test_local_bindings_are_declared() {
        let dir = project();
        let dest = dir.path().join("src/__tests__/math.test.ts");
        let candidate = r#"function helper(n: number) { return n; }
const { build, parts: [first] } = { build: () => 1, parts: [() => 2] };
const make = (factory = () => 3) => factory();
it('x', () => {
  try { helper(build()); first(); make(); } catch (fail) { fail(); }
  const d = new Date();
  expect(Promise.resolve(d)).toBeDefined();
});
"#;
        let outcome = vitest().verify(candidate, &dest);
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    }

    #[test]
    fn test_jest_global_not_ambient_under_vitest() {
        let dir = project();
        let dest = dir.path().join("src/__tests__/math.test.ts");
        let outcome = vitest().verify("it('x', () => {\n  const f = jest.fn();\n  expect(f).toBeDefined();\n});\n", &dest);
        // member calls are not checked, only bare callees
        assert!(outcome.diagnostics.is_empty());

        let outcome = vitest().verify("it('x', () => {\n  spyOn(console, 'log');\n});\n", &dest);
        assert_eq!(outcome.diagnostics[0].message, "Cannot find name 'spyOn'.");
    }

    #[test]
    fn test_unresolved_relative_import() {
        let dir = project();
        let dest = dir.path().join("src/__tests__/math.test.ts");
        let candidate = "import { add } from '../maths';\nit('x', () => add(1, 2));\n";
        let outcome = vitest().verify(candidate, &dest);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].class, DiagnosticClass::UnresolvedRelativeModule);
        assert_eq!(outcome.diagnostics[0].code, "TS2307");
    }

    #[test]
    fn test_installed_package_not_reported() {
        let dir = project();
        fs::create_dir_all(dir.path().join("node_modules/@testing-library/react")).unwrap();
        let dest = dir.path().join("src/__tests__/math.test.ts");
        let candidate = "import { render } from '@testing-library/react';\nit('x', () => render(null));\n";
        let outcome = vitest().verify(candidate, &dest);
        assert_eq!(outcome.suppressed, 0);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_zero_tests_is_distinct_from_diagnostics() {
        let dir = project();
        let dest = dir.path().join("src/__tests__/math.test.ts");
        let outcome = vitest().verify("describe('nothing', () => {});\n", &dest);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.test_case_count, 0);
        assert!(!outcome.passed());
    }

    #[test]
    fn test_count_test_cases() {
        let code = "it('a', f);\ntest.each([1])('b', f);\nit.only('c', f);\nsplit('x');\nobj.it('d');\nconst test = 1;\n";
        assert_eq!(count_test_cases(code), 3);
    }

    #[test]
    fn test_unused_import_cleaned_before_check() {
        let dir = project();
        let dest = dir.path().join("src/__tests__/math.test.ts");
        let candidate = "import { it, expect, vi } from 'vitest';\nimport { add } from '../math';\nit('adds', () => expect(add(1, 2)).toBe(3));\n";
        let outcome = vitest().verify(candidate, &dest);
        assert_eq!(outcome.cleanup.removed_specifiers, vec!["vi".to_string()]);
        assert!(outcome.normalized_code.starts_with("import { it, expect } from 'vitest';"));
    }
}
