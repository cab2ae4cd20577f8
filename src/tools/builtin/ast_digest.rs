// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Compact structural summary of a module

use async_trait::async_trait;
use serde_json::{json, Value};

use super::list_exports::file_text;
use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::syntax::{self, Dialect};
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext, ToolKind};

const SIGNATURE_CHARS: usize = 160;

pub struct AstDigestTool;

#[async_trait]
impl Tool for AstDigestTool {
    fn kind(&self) -> ToolKind {
        ToolKind::AstDigest
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind().name().to_string(),
            description: "Summarize a module: imports, and top-level declarations with their signatures and line ranges.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "Module path relative to the project root", true)
                .build(),
        }
    }

    async fn execute(&self, input: &Value, context: &ToolContext) -> Result<Value> {
        let path = required_str(input, "path")?;
        let text = file_text(context, path).await?;
        let tree = syntax::parse(&text, Dialect::for_path(path))?;

        let declarations: Vec<Value> = syntax::top_level_declarations(&tree, &text)
            .into_iter()
            .map(|d| {
                let signature: String = text[d.range.clone()]
                    .lines()
                    .next()
                    .unwrap_or("")
                    .trim()
                    .chars()
                    .take(SIGNATURE_CHARS)
                    .collect();
                json!({
                    "name": d.name,
                    "kind": d.kind.as_str(),
                    "exported": d.exported,
                    "default": d.default_export,
                    "lines": [d.lines.0, d.lines.1],
                    "signature": signature,
                })
            })
            .collect();

        let imports: Vec<String> = syntax::parse_imports(&text)
            .into_iter()
            .map(|i| i.raw_path)
            .collect();

        Ok(json!({
            "path": path,
            "imports": imports,
            "declarations": declarations,
            "syntax_errors": syntax::syntax_problems(&tree, &text).len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::fixture;

    #[tokio::test]
    async fn test_ast_digest() {
        let (_dir, context) = fixture();
        let value = AstDigestTool
            .execute(&json!({"path": "src/App.tsx"}), &context)
            .await
            .unwrap();

        assert_eq!(value["imports"], json!(["./Button", "./math"]));
        let decl = &value["declarations"][0];
        assert_eq!(decl["name"], "App");
        assert_eq!(decl["default"], true);
        assert_eq!(decl["lines"], json!([4, 6]));
        assert_eq!(decl["signature"], "export default function App() {");
        assert_eq!(value["syntax_errors"], 0);
    }
}
