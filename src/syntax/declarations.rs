// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Top-level declaration extraction

use std::ops::Range;

use tree_sitter::{Node, Tree};

use super::{named_children, node_text};

/// What a top-level declaration is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// `function f() {}` and generator functions
    Function,
    /// `const f = () => {}` and friends, including wrapped callbacks like `memo(() => ...)`
    FunctionValue,
    Class,
    /// Any other variable
    Variable,
    TypeAlias,
    Interface,
    Enum,
}

impl DeclarationKind {
    /// Whether this declaration has a body worth testing on its own
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Function | DeclarationKind::FunctionValue | DeclarationKind::Class
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Function | DeclarationKind::FunctionValue => "function",
            DeclarationKind::Class => "class",
            DeclarationKind::Variable => "variable",
            DeclarationKind::TypeAlias => "type",
            DeclarationKind::Interface => "interface",
            DeclarationKind::Enum => "enum",
        }
    }
}

/// A named top-level declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Byte range, including a wrapping `export` when present
    pub range: Range<usize>,
    /// 1-based first and last line
    pub lines: (usize, usize),
    pub exported: bool,
    pub default_export: bool,
}

fn is_function_node(kind: &str) -> bool {
    matches!(
        kind,
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

/// `memo(() => ...)`, `forwardRef(function X() {})`
fn wraps_function(node: Node<'_>) -> bool {
    if node.kind() != "call_expression" {
        return false;
    }
    node.child_by_field_name("arguments")
        .map(|args| named_children(args).iter().any(|a| is_function_node(a.kind())))
        .unwrap_or(false)
}

fn value_kind(declarator: Node<'_>) -> DeclarationKind {
    match declarator.child_by_field_name("value") {
        Some(value) if is_function_node(value.kind()) || wraps_function(value) => {
            DeclarationKind::FunctionValue
        }
        _ => DeclarationKind::Variable,
    }
}

fn push_from_node(
    node: Node<'_>,
    outer: Node<'_>,
    exported: bool,
    default_export: bool,
    source: &str,
    out: &mut Vec<Declaration>,
) {
    let named_kind = match node.kind() {
        "function_declaration" | "generator_function_declaration" => Some(DeclarationKind::Function),
        "class_declaration" | "abstract_class_declaration" => Some(DeclarationKind::Class),
        "type_alias_declaration" => Some(DeclarationKind::TypeAlias),
        "interface_declaration" => Some(DeclarationKind::Interface),
        "enum_declaration" => Some(DeclarationKind::Enum),
        _ => None,
    };

    let lines = (
        outer.start_position().row + 1,
        outer.end_position().row + 1,
    );

    if let Some(kind) = named_kind {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_else(|| "default".to_string());
        out.push(Declaration {
            name,
            kind,
            range: outer.byte_range(),
            lines,
            exported,
            default_export,
        });
        return;
    }

    if matches!(node.kind(), "lexical_declaration" | "variable_declaration") {
        let declarators: Vec<Node<'_>> = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
            .collect();
        for declarator in declarators {
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            // Destructuring patterns have no single name
            if name_node.kind() != "identifier" {
                continue;
            }
            out.push(Declaration {
                name: node_text(name_node, source).to_string(),
                kind: value_kind(declarator),
                range: outer.byte_range(),
                lines,
                exported,
                default_export,
            });
        }
    }
}

/// Named declarations directly under the program node, in source order.
pub fn top_level_declarations(tree: &Tree, source: &str) -> Vec<Declaration> {
    let mut out = Vec::new();

    for node in named_children(tree.root_node()) {
        if node.kind() == "export_statement" {
            let default_export = super::children(node)
                .iter()
                .any(|c| c.kind() == "default");
            if let Some(decl) = node.child_by_field_name("declaration") {
                push_from_node(decl, node, true, default_export, source, &mut out);
            } else if let Some(value) = node.child_by_field_name("value") {
                // `export default () => {}` / `export default function () {}`
                if is_function_node(value.kind()) || wraps_function(value) {
                    out.push(Declaration {
                        name: "default".to_string(),
                        kind: DeclarationKind::FunctionValue,
                        range: node.byte_range(),
                        lines: (
                            node.start_position().row + 1,
                            node.end_position().row + 1,
                        ),
                        exported: true,
                        default_export: true,
                    });
                }
            }
        } else {
            push_from_node(node, node, false, false, source, &mut out);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse, Dialect};

    fn decls(source: &str, dialect: Dialect) -> Vec<Declaration> {
        let tree = parse(source, dialect).unwrap();
        top_level_declarations(&tree, source)
    }

    #[test]
    fn test_function_and_arrow_declarations() {
        let source = r#"
import { x } from './x';

export function add(a: number, b: number) { return a + b; }
const double = (n: number) => n * 2;
export const useCounter = () => { return 1; };
const LIMIT = 10;
"#;
        let found = decls(source, Dialect::TypeScript);
        let names: Vec<(&str, DeclarationKind, bool)> = found
            .iter()
            .map(|d| (d.name.as_str(), d.kind, d.exported))
            .collect();
        assert_eq!(
            names,
            vec![
                ("add", DeclarationKind::Function, true),
                ("double", DeclarationKind::FunctionValue, false),
                ("useCounter", DeclarationKind::FunctionValue, true),
                ("LIMIT", DeclarationKind::Variable, false),
            ]
        );
    }

    #[test]
    fn test_export_range_includes_keyword() {
        let source = "export function f() {}\n";
        let found = decls(source, Dialect::TypeScript);
        assert_eq!(&source[found[0].range.clone()], "export function f() {}");
        assert_eq!(found[0].lines, (1, 1));
    }

    #[test]
    fn test_class_and_types() {
        let source = "export class Store {}\nexport type T = string;\ninterface I {}\nenum E { A }\n";
        let kinds: Vec<DeclarationKind> = decls(source, Dialect::TypeScript)
            .iter()
            .map(|d| d.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                DeclarationKind::Class,
                DeclarationKind::TypeAlias,
                DeclarationKind::Interface,
                DeclarationKind::Enum,
            ]
        );
    }

    #[test]
    fn test_default_exports() {
        let source = "export default function App() { return <div />; }\n";
        let found = decls(source, Dialect::Tsx);
        assert_eq!(found[0].name, "App");
        assert!(found[0].default_export);

        let anonymous = decls("export default () => 1;\n", Dialect::TypeScript);
        assert_eq!(anonymous[0].name, "default");
        assert_eq!(anonymous[0].kind, DeclarationKind::FunctionValue);
    }

    #[test]
    fn test_wrapped_component() {
        let source = "export const Card = memo(() => <div />);\n";
        let found = decls(source, Dialect::Tsx);
        assert_eq!(found[0].kind, DeclarationKind::FunctionValue);
        assert!(found[0].kind.is_callable());
    }

    #[test]
    fn test_destructuring_skipped() {
        let found = decls("const { a, b } = obj;\n", Dialect::TypeScript);
        assert!(found.is_empty());
    }
}
