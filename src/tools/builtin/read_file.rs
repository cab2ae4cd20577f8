// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Read a project file with line numbers

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ForgeError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext, ToolKind};

const DEFAULT_LIMIT: usize = 200;
const MAX_LIMIT: usize = 2000;
const MAX_LINE_CHARS: usize = 300;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ReadFile
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind().name().to_string(),
            description: "Read a file from the project. Returns numbered lines.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "Path relative to the project root", true)
                .count("offset", "First line to return, 1-based (default 1)", false)
                .count("limit", "Maximum number of lines (default 200)", false)
                .build(),
        }
    }

    async fn execute(&self, input: &Value, context: &ToolContext) -> Result<Value> {
        let path_str = required_str(input, "path")?;
        let offset = input["offset"]
            .as_u64()
            .map_or(1, |n| usize::try_from(n).unwrap_or(usize::MAX))
            .max(1);
        let limit = input["limit"]
            .as_u64()
            .map_or(DEFAULT_LIMIT, |n| usize::try_from(n).unwrap_or(MAX_LIMIT))
            .min(MAX_LIMIT);

        let path = context.resolve(path_str)?;
        if !path.is_file() {
            return Err(ForgeError::InvalidInput(format!(
                "File not found: {}",
                path_str
            )));
        }
        let content = tokio::fs::read_to_string(&path).await?;

        let lines: Vec<&str> = content.lines().collect();
        let start = (offset - 1).min(lines.len());
        let end = start.saturating_add(limit).min(lines.len());

        let mut text = String::new();
        for (i, line) in lines[start..end].iter().enumerate() {
            let shown: String = line.chars().take(MAX_LINE_CHARS).collect();
            text.push_str(&format!("{:>5}| {}\n", start + i + 1, shown));
        }

        Ok(json!({
            "path": path_str,
            "total_lines": lines.len(),
            "from": start + 1,
            "to": end,
            "content": text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::fixture;

    #[tokio::test]
    async fn test_read_file_numbered() {
        let (_dir, context) = fixture();
        let value = ReadFileTool
            .execute(&json!({"path": "src/math.ts", "limit": 2}), &context)
            .await
            .unwrap();
        assert_eq!(value["total_lines"], 4);
        assert_eq!(value["to"], 2);
        assert_eq!(
            value["content"],
            "    1| export function add(a: number, b: number) {\n    2|   return a + b;\n"
        );
    }

    #[tokio::test]
    async fn test_read_file_offset() {
        let (_dir, context) = fixture();
        let value = ReadFileTool
            .execute(&json!({"path": "src/math.ts", "offset": 4}), &context)
            .await
            .unwrap();
        assert_eq!(value["content"], "    4| export const PI = 3.14;\n");
    }

    #[tokio::test]
    async fn test_read_file_huge_limit_is_clamped() {
        let (_dir, context) = fixture();
        let value = ReadFileTool
            .execute(
                &json!({"path": "src/math.ts", "offset": 2, "limit": u64::MAX}),
                &context,
            )
            .await
            .unwrap();
        assert_eq!(value["from"], 2);
        assert_eq!(value["to"], 4);
    }

    #[tokio::test]
    async fn test_read_file_offset_past_end() {
        let (_dir, context) = fixture();
        let value = ReadFileTool
            .execute(&json!({"path": "src/math.ts", "offset": u64::MAX}), &context)
            .await
            .unwrap();
        assert_eq!(value["content"], "");
    }

    #[tokio::test]
    async fn test_read_file_missing_and_outside() {
        let (_dir, context) = fixture();
        assert!(ReadFileTool
            .execute(&json!({"path": "src/nope.ts"}), &context)
            .await
            .is_err());
        assert!(ReadFileTool
            .execute(&json!({"path": "../../etc/hosts"}), &context)
            .await
            .is_err());
    }
}
