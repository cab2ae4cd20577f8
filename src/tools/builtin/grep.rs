// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Regex search over project sources

use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::{json, Value};

use crate::error::{ForgeError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext, ToolKind};

const DEFAULT_LIMIT: usize = 50;
const MAX_MATCH_CHARS: usize = 200;

pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Grep
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind().name().to_string(),
            description: "Search project source files with a regular expression. Returns matching lines with paths and line numbers.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("pattern", "Regex pattern to search for", true)
                .string("glob", "Only search paths matching this glob, e.g. 'src/**/*.tsx'", false)
                .boolean("case_insensitive", "Case insensitive search (default false)", false)
                .count("limit", "Maximum number of matches (default 50)", false)
                .build(),
        }
    }

    async fn execute(&self, input: &Value, context: &ToolContext) -> Result<Value> {
        let pattern = required_str(input, "pattern")?;
        let case_insensitive = input["case_insensitive"].as_bool().unwrap_or(false);
        let limit = input["limit"].as_u64().unwrap_or(DEFAULT_LIMIT as u64) as usize;

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .size_limit(1 << 20)
            .build()
            .map_err(|e| ForgeError::InvalidInput(format!("Invalid regex pattern: {}", e)))?;

        let glob = match input["glob"].as_str() {
            Some(g) => Some(
                glob::Pattern::new(g)
                    .map_err(|e| ForgeError::InvalidInput(format!("Invalid glob: {}", e)))?,
            ),
            None => None,
        };

        let mut matches = Vec::new();
        let mut truncated = false;

        'files: for unit in context.files.iter() {
            if let Some(glob) = &glob {
                if !glob.matches(&unit.rel_path) {
                    continue;
                }
            }
            for (i, line) in unit.text.lines().enumerate() {
                if !regex.is_match(line) {
                    continue;
                }
                if matches.len() >= limit {
                    truncated = true;
                    break 'files;
                }
                let text: String = line.trim().chars().take(MAX_MATCH_CHARS).collect();
                matches.push(json!({
                    "path": unit.rel_path,
                    "line": i + 1,
                    "text": text,
                }));
            }
        }

        Ok(json!({ "matches": matches, "truncated": truncated }))
    }
}
