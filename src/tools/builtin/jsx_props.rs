// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Infer a component's props from its declaration and its JSX call sites

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tree_sitter::Node;

use crate::error::{ForgeError, Result};
use crate::llm::provider::ToolDefinition;
use crate::syntax::{self, node_text, Dialect};
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext, ToolKind};

pub struct InferJsxPropsTool;

fn is_jsx_file(rel_path: &str) -> bool {
    rel_path.ends_with(".tsx") || rel_path.ends_with(".jsx") || rel_path.ends_with(".js")
}

/// Names destructured from the first parameter of the component's declaration
fn declared_props(root: Node<'_>, source: &str, component: &str) -> Option<Vec<String>> {
    let mut found: Option<Vec<String>> = None;

    syntax::visit(root, &mut |node| {
        if found.is_some() {
            return;
        }
        let function = match node.kind() {
            "function_declaration" => node
                .child_by_field_name("name")
                .filter(|n| node_text(*n, source) == component)
                .map(|_| node),
            "variable_declarator" => node
                .child_by_field_name("name")
                .filter(|n| node_text(*n, source) == component)
                .and_then(|_| node.child_by_field_name("value")),
            _ => None,
        };
        let Some(function) = function else { return };

        let pattern = function
            .child_by_field_name("parameters")
            .and_then(|params| syntax::named_children(params).into_iter().next())
            .and_then(|first| first.child_by_field_name("pattern"))
            .filter(|p| p.kind() == "object_pattern");
        let Some(pattern) = pattern else {
            found = Some(Vec::new());
            return;
        };

        let mut names = Vec::new();
        for prop in syntax::named_children(pattern) {
            let name_node = match prop.kind() {
                "shorthand_property_identifier_pattern" => Some(prop),
                "pair_pattern" => prop.child_by_field_name("key"),
                "object_assignment_pattern" => prop.child_by_field_name("left"),
                _ => None,
            };
            if let Some(n) = name_node {
                names.push(node_text(n, source).to_string());
            }
        }
        found = Some(names);
    });

    found
}

fn collect_call_sites(
    root: Node<'_>,
    source: &str,
    component: &str,
    counts: &mut BTreeMap<String, usize>,
) -> usize {
    let mut sites = 0;
    syntax::visit(root, &mut |node| {
        if !matches!(node.kind(), "jsx_opening_element" | "jsx_self_closing_element") {
            return;
        }
        let matches_name = node
            .child_by_field_name("name")
            .is_some_and(|n| node_text(n, source) == component);
        if !matches_name {
            return;
        }
        sites += 1;
        for attr in syntax::named_children(node) {
            if attr.kind() != "jsx_attribute" {
                continue;
            }
            if let Some(name) = syntax::named_children(attr).into_iter().next() {
                *counts.entry(node_text(name, source).to_string()).or_insert(0) += 1;
            }
        }
    });
    sites
}

#[async_trait]
impl Tool for InferJsxPropsTool {
    fn kind(&self) -> ToolKind {
        ToolKind::InferJsxProps
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind().name().to_string(),
            description: "Infer a React component's props: names destructured in its declaration and attributes passed at JSX call sites.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("component", "Component name, e.g. 'Button'", true)
                .build(),
        }
    }

    async fn execute(&self, input: &Value, context: &ToolContext) -> Result<Value> {
        let component = required_str(input, "component")?;
        if !component.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(ForgeError::InvalidInput(format!(
                "'{}' does not look like a component name",
                component
            )));
        }

        let mut declared: Option<Vec<String>> = None;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut call_sites = 0;

        for unit in context.files.iter().filter(|u| is_jsx_file(&u.rel_path)) {
            let Ok(tree) = syntax::parse(&unit.text, Dialect::for_path(&unit.rel_path)) else {
                continue;
            };
            if declared.is_none() {
                declared = declared_props(tree.root_node(), &unit.text, component);
            }
            call_sites += collect_call_sites(tree.root_node(), &unit.text, component, &mut counts);
        }

        let passed: Vec<Value> = counts
            .into_iter()
            .map(|(name, count)| json!({ "name": name, "count": count }))
            .collect();

        Ok(json!({
            "component": component,
            "declared": declared.unwrap_or_default(),
            "passed": passed,
            "call_sites": call_sites,
        }))
    }
}
