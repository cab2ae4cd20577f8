// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Find where an identifier is used across the project

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use crate::error::{ForgeError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext, ToolKind};

const DEFAULT_LIMIT: usize = 30;

pub struct FindUsagesTool;

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[async_trait]
impl Tool for FindUsagesTool {
    fn kind(&self) -> ToolKind {
        ToolKind::FindUsages
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind().name().to_string(),
            description: "Find whole-word uses of an identifier in project sources, excluding import lines.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("identifier", "Identifier to look for", true)
                .count("limit", "Maximum number of results (default 30)", false)
                .build(),
        }
    }

    async fn execute(&self, input: &Value, context: &ToolContext) -> Result<Value> {
        let identifier = required_str(input, "identifier")?;
        if !is_identifier(identifier) {
            return Err(ForgeError::InvalidInput(format!(
                "'{}' is not an identifier",
                identifier
            )));
        }
        let limit = input["limit"].as_u64().unwrap_or(DEFAULT_LIMIT as u64) as usize;

        let word = Regex::new(&format!(
            r"(?:^|[^\w$]){}(?:[^\w$]|$)",
            regex::escape(identifier)
        ))
        .map_err(|e| ForgeError::InvalidInput(e.to_string()))?;

        let mut usages = Vec::new();
        let mut files = 0;
        for unit in context.files.iter() {
            let mut hit = false;
            for (i, line) in unit.text.lines().enumerate() {
                let trimmed = line.trim_start();
                if trimmed.starts_with("import ") || !word.is_match(line) {
                    continue;
                }
                hit = true;
                if usages.len() < limit {
                    usages.push(json!({
                        "path": unit.rel_path,
                        "line": i + 1,
                        "text": trimmed.chars().take(200).collect::<String>(),
                    }));
                }
            }
            if hit {
                files += 1;
            }
        }

        Ok(json!({ "identifier": identifier, "files": files, "usages": usages }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::fixture;

    #[tokio::test]
    async fn test_find_usages_whole_word() {
        let (_dir, context) = fixture();
        let value = FindUsagesTool
            .execute(&json!({"identifier": "add"}), &context)
            .await
            .unwrap();
        let usages = value["usages"].as_array().unwrap();
        // App.tsx call site and the declaration in math.ts; the import line is skipped
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0]["path"], "src/App.tsx");
        assert_eq!(usages[0]["line"], 5);
        assert_eq!(value["files"], 2);
    }

    #[tokio::test]
    async fn test_find_usages_rejects_patterns() {
        let (_dir, context) = fixture();
        assert!(FindUsagesTool
            .execute(&json!({"identifier": "a.*"}), &context)
            .await
            .is_err());
    }
}
