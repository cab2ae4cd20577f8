// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conservative import cleanup for generated tests
//!
//! Only named import specifiers are ever removed. Default, namespace and
//! side-effect imports are left alone, and nothing is touched when the file
//! does not parse cleanly.

use std::collections::HashMap;
use std::ops::Range;

use tree_sitter::Node;

use crate::syntax::{self, classify_import, node_text, Dialect, ImportKind};

/// What the cleanup pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed_specifiers: Vec<String>,
    pub reordered: bool,
}

impl CleanupReport {
    pub fn changed(&self) -> bool {
        !self.removed_specifiers.is_empty() || self.reordered
    }
}

/// Drop unused named imports, then order the leading import block.
pub fn cleanup(source: &str, dialect: Dialect) -> (String, CleanupReport) {
    let mut report = CleanupReport::default();

    let Some(pruned) = remove_unused_imports(source, dialect, &mut report) else {
        return (source.to_string(), report);
    };
    match sort_import_block(&pruned, dialect) {
        Some(sorted) => {
            report.reordered = sorted != pruned;
            (sorted, report)
        }
        None => (pruned, report),
    }
}

struct ParsedImport<'t> {
    node: Node<'t>,
    type_only: bool,
    default: Option<String>,
    namespace: Option<String>,
    /// (specifier text, local name)
    named: Vec<(String, String)>,
    source: String,
}

fn parse_import<'t>(node: Node<'t>, source: &str) -> Option<ParsedImport<'t>> {
    let source_node = node.child_by_field_name("source")?;
    let mut parsed = ParsedImport {
        node,
        type_only: false,
        default: None,
        namespace: None,
        named: Vec::new(),
        source: node_text(source_node, source).to_string(),
    };

    for child in syntax::children(node) {
        match child.kind() {
            "type" => parsed.type_only = true,
            "import_clause" => {
                for part in syntax::named_children(child) {
                    match part.kind() {
                        "identifier" => parsed.default = Some(node_text(part, source).to_string()),
                        "namespace_import" => {
                            parsed.namespace = Some(node_text(part, source).to_string())
                        }
                        "named_imports" => {
                            for spec in syntax::named_children(part) {
                                if spec.kind() != "import_specifier" {
                                    continue;
                                }
                                let local = spec
                                    .child_by_field_name("alias")
                                    .or_else(|| spec.child_by_field_name("name"))
                                    .map(|n| node_text(n, source).to_string())
                                    .unwrap_or_default();
                                parsed
                                    .named
                                    .push((node_text(spec, source).to_string(), local));
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Some(parsed)
}

fn is_reference(kind: &str) -> bool {
    matches!(
        kind,
        "identifier" | "type_identifier" | "shorthand_property_identifier"
    )
}

fn remove_unused_imports(
    source: &str,
    dialect: Dialect,
    report: &mut CleanupReport,
) -> Option<String> {
    let tree = syntax::parse(source, dialect).ok()?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let imports: Vec<ParsedImport<'_>> = syntax::named_children(root)
        .into_iter()
        .filter(|n| n.kind() == "import_statement")
        .filter_map(|n| parse_import(n, source))
        .collect();

    // References outside import statements
    let mut uses: HashMap<&str, usize> = HashMap::new();
    for child in syntax::named_children(root) {
        if child.kind() == "import_statement" {
            continue;
        }
        syntax::visit(child, &mut |node| {
            if is_reference(node.kind()) {
                *uses.entry(node_text(node, source)).or_insert(0) += 1;
            }
        });
    }

    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    for import in &imports {
        let (kept, dropped): (Vec<_>, Vec<_>) = import
            .named
            .iter()
            .partition(|(_, local)| uses.contains_key(local.as_str()));
        if dropped.is_empty() {
            continue;
        }
        report
            .removed_specifiers
            .extend(dropped.iter().map(|(_, local)| local.clone()));

        let mut parts: Vec<String> = Vec::new();
        parts.extend(import.default.clone());
        parts.extend(import.namespace.clone());
        if !kept.is_empty() {
            let specs: Vec<&str> = kept.iter().map(|(text, _)| text.as_str()).collect();
            parts.push(format!("{{ {} }}", specs.join(", ")));
        }

        let mut range = import.node.byte_range();
        let replacement = if parts.is_empty() {
            // Take the line break with it
            if source[range.end..].starts_with('\n') {
                range.end += 1;
            }
            String::new()
        } else {
            format!(
                "import {}{} from {};",
                if import.type_only { "type " } else { "" },
                parts.join(", "),
                import.source
            )
        };
        edits.push((range, replacement));
    }

    let mut out = source.to_string();
    for (range, replacement) in edits.into_iter().rev() {
        out.replace_range(range, &replacement);
    }
    Some(out)
}

fn import_group(node: Node<'_>, source: &str) -> Option<u8> {
    let spec = node_text(node.child_by_field_name("source")?, source);
    let spec = spec.trim_matches(|c| c == '\'' || c == '"' || c == '`');
    Some(match classify_import(spec) {
        ImportKind::External | ImportKind::Absolute => 0,
        ImportKind::Relative => 1,
    })
}

fn sort_import_block(source: &str, dialect: Dialect) -> Option<String> {
    let tree = syntax::parse(source, dialect).ok()?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let block: Vec<Node<'_>> = syntax::named_children(root)
        .into_iter()
        .skip_while(|n| n.kind() == "comment")
        .take_while(|n| n.kind() == "import_statement")
        .collect();
    if block.len() < 2 {
        return Some(source.to_string());
    }

    // Side-effect imports are order sensitive
    if block
        .iter()
        .any(|n| syntax::named_children(*n).iter().all(|c| c.kind() != "import_clause"))
    {
        return Some(source.to_string());
    }

    let mut keyed: Vec<(u8, &str)> = block
        .iter()
        .map(|n| Some((import_group(*n, source)?, node_text(*n, source))))
        .collect::<Option<Vec<_>>>()?;
    keyed.sort_by_key(|(group, _)| *group);

    let start = block.first()?.start_byte();
    let end = block.last()?.end_byte();
    let joined = keyed
        .iter()
        .map(|(_, text)| *text)
        .collect::<Vec<_>>()
        .join("\n");

    let original_order: Vec<&str> = block.iter().map(|n| node_text(*n, source)).collect();
    let new_order: Vec<&str> = keyed.iter().map(|(_, text)| *text).collect();
    if original_order == new_order {
        return Some(source.to_string());
    }

    let mut out = String::with_capacity(source.len());
    out.push_str(&source[..start]);
    out.push_str(&joined);
    out.push_str(&source[end..]);
    Some(out)
}
