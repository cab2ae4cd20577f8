// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! List the exports of a module

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ForgeError, Result};
use crate::llm::provider::ToolDefinition;
use crate::syntax::parse_exports;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext, ToolKind};

pub struct ListExportsTool;

/// Text of a project file, from the scan when possible
pub(super) async fn file_text(context: &ToolContext, path: &str) -> Result<String> {
    if let Some(unit) = context.source(path) {
        return Ok(unit.text.clone());
    }
    let resolved = context.resolve(path)?;
    if !resolved.is_file() {
        return Err(ForgeError::InvalidInput(format!("File not found: {}", path)));
    }
    Ok(tokio::fs::read_to_string(resolved).await?)
}

#[async_trait]
impl Tool for ListExportsTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ListExports
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind().name().to_string(),
            description: "List the names a module exports, with their kind and line.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "Module path relative to the project root", true)
                .build(),
        }
    }

    async fn execute(&self, input: &Value, context: &ToolContext) -> Result<Value> {
        let path = required_str(input, "path")?;
        let text = file_text(context, path).await?;

        let exports: Vec<Value> = parse_exports(&text)
            .into_iter()
            .map(|e| json!({ "name": e.name, "kind": e.kind.as_str(), "line": e.line }))
            .collect();

        Ok(json!({ "path": path, "exports": exports }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::fixture;

    #[tokio::test]
    async fn test_list_exports() {
        let (_dir, context) = fixture();
        let value = ListExportsTool
            .execute(&json!({"path": "./src/math.ts"}), &context)
            .await
            .unwrap();
        assert_eq!(
            value["exports"],
            json!([
                {"name": "add", "kind": "function", "line": 1},
                {"name": "PI", "kind": "constant", "line": 4},
            ])
        );
    }

    #[tokio::test]
    async fn test_list_exports_default() {
        let (_dir, context) = fixture();
        let value = ListExportsTool
            .execute(&json!({"path": "src/App.tsx"}), &context)
            .await
            .unwrap();
        assert_eq!(value["exports"][0]["name"], "App");
        assert_eq!(value["exports"][0]["kind"], "default");
    }
}
