// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Read-only project introspection tools for the planning agent
//!
//! The tool set is closed: [`ToolKind`] enumerates every tool and the
//! registry dispatches by name, rejecting anything it does not know. No tool
//! writes to the project.

pub mod builtin;
pub mod definition;

pub use definition::SchemaBuilder;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ForgeError, Result};
use crate::llm::provider::ToolDefinition;
use crate::project::SourceUnit;
use crate::utils::truncate_middle;

/// Tool output is capped at this many characters before it reaches the model
pub const MAX_TOOL_OUTPUT_CHARS: usize = 8000;

/// Every tool the agent may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ReadFile,
    ListExports,
    FindUsages,
    AstDigest,
    Grep,
    InferJsxProps,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::ReadFile,
        ToolKind::ListExports,
        ToolKind::FindUsages,
        ToolKind::AstDigest,
        ToolKind::Grep,
        ToolKind::InferJsxProps,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::ReadFile => "read_file",
            ToolKind::ListExports => "list_exports",
            ToolKind::FindUsages => "find_usages",
            ToolKind::AstDigest => "ast_digest",
            ToolKind::Grep => "grep",
            ToolKind::InferJsxProps => "infer_jsx_props",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Read-only view of the project handed to every tool
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub project_root: PathBuf,
    /// Source files from the project scan
    pub files: Arc<Vec<SourceUnit>>,
}

impl ToolContext {
    pub fn new(project_root: PathBuf, files: Arc<Vec<SourceUnit>>) -> Self {
        Self {
            project_root,
            files,
        }
    }

    /// Resolve a project-relative path, refusing anything outside the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.project_root.join(candidate)
        };

        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir => {}
                other => normalized.push(other.as_os_str()),
            }
        }

        let outside = || {
            ForgeError::InvalidInput(format!("Path '{}' is outside the project", path))
        };
        if !normalized.starts_with(&self.project_root) {
            return Err(outside());
        }

        // Symlinks inside the project may still point elsewhere
        match normalized.canonicalize() {
            Ok(real) => {
                let root = self
                    .project_root
                    .canonicalize()
                    .unwrap_or_else(|_| self.project_root.clone());
                if real.starts_with(&root) {
                    Ok(real)
                } else {
                    Err(outside())
                }
            }
            Err(_) => Ok(normalized),
        }
    }

    /// Scanned source unit by relative path
    pub fn source(&self, rel_path: &str) -> Option<&SourceUnit> {
        let wanted = rel_path.trim_start_matches("./");
        self.files.iter().find(|unit| unit.rel_path == wanted)
    }
}

/// Result of one tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub output: ToolOutput,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Success(Value),
    Error(String),
}

impl ToolResult {
    pub fn success(tool_use_id: impl Into<String>, output: Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            output: ToolOutput::Success(output),
        }
    }

    pub fn error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            output: ToolOutput::Error(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.output, ToolOutput::Error(_))
    }

    /// `{ok:true,result}` or `{ok:false,error}`, serialized and capped
    pub fn observation(&self) -> String {
        let value = match &self.output {
            ToolOutput::Success(result) => json!({ "ok": true, "result": result }),
            ToolOutput::Error(error) => json!({ "ok": false, "error": error }),
        };
        truncate_middle(&value.to_string(), MAX_TOOL_OUTPUT_CHARS)
    }
}

/// A read-only introspection tool
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Errors are turned into `{ok:false}` observations by the registry.
    async fn execute(&self, input: &Value, context: &ToolContext) -> Result<Value>;
}

/// Name did not match any registered tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTool(pub String);

/// Lookup table from tool name to implementation
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry with every built-in tool
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::ReadFileTool));
        registry.register(Arc::new(builtin::ListExportsTool));
        registry.register(Arc::new(builtin::FindUsagesTool));
        registry.register(Arc::new(builtin::AstDigestTool));
        registry.register(Arc::new(builtin::GrepTool));
        registry.register(Arc::new(builtin::InferJsxPropsTool));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    /// Definitions in a stable order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolKind::ALL
            .iter()
            .filter_map(|kind| self.tools.get(kind))
            .map(|tool| tool.definition())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch a call by name.
    ///
    /// Unknown names are an error for the caller; a failing tool is not, it
    /// becomes an error observation.
    pub async fn dispatch(
        &self,
        name: &str,
        tool_use_id: &str,
        input: &Value,
        context: &ToolContext,
    ) -> std::result::Result<ToolResult, UnknownTool> {
        let tool = ToolKind::from_name(name)
            .and_then(|kind| self.tools.get(&kind))
            .ok_or_else(|| UnknownTool(name.to_string()))?;

        Ok(match tool.execute(input, context).await {
            Ok(value) => ToolResult::success(tool_use_id, value),
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "tool call failed");
                ToolResult::error(tool_use_id, e.to_string())
            }
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Required string argument
pub(crate) fn required_str<'v>(input: &'v Value, key: &str) -> Result<&'v str> {
    input[key]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ForgeError::InvalidInput(format!("{} is required", key)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Small React project on disk plus its scanned sources
    pub fn fixture() -> (TempDir, ToolContext) {
        let dir = TempDir::new().unwrap();
        let files = [
            (
                "src/math.ts",
                "export function add(a: number, b: number) {\n  return a + b;\n}\nexport const PI = 3.14;\n",
            ),
            (
                "src/Button.tsx",
                "import React from 'react';\n\nexport function Button({ label, onClick, disabled = false }: Props) {\n  return <button disabled={disabled} onClick={onClick}>{label}</button>;\n}\n",
            ),
            (
                "src/App.tsx",
                "import { Button } from './Button';\nimport { add } from './math';\n\nexport default function App() {\n  return <Button label={String(add(1, 2))} onClick={() => {}} />;\n}\n",
            ),
        ];
        let mut units = Vec::new();
        for (path, text) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, text).unwrap();
            units.push(SourceUnit::new(path, text));
        }
        units.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        let context = ToolContext::new(dir.path().to_path_buf(), Arc::new(units));
        (dir, context)
    }
}
