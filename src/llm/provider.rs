// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM Provider trait and related types
//!
//! Defines the abstraction layer for the generative backend. The orchestrator
//! only ever talks to a `dyn LlmProvider`; it never knows which service sits
//! behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::llm::message::Message;

/// Main trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "ollama", "openai")
    fn name(&self) -> &str;

    /// List known models
    fn available_models(&self) -> Vec<ModelInfo>;

    /// Check if a specific model is supported
    fn supports_model(&self, model: &str) -> bool;

    /// Get model info by ID
    fn get_model_info(&self, model: &str) -> Option<ModelInfo> {
        self.available_models().into_iter().find(|m| m.id == model)
    }

    /// Probe the context window of a model.
    ///
    /// Returns `Ok(None)` when the backend cannot tell; callers fall back to a
    /// configured default.
    async fn context_window(&self, model: &str) -> Result<Option<u32>> {
        Ok(self.get_model_info(model).map(|m| m.context_window))
    }

    /// Non-streaming completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Request for completion
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model to use
    pub model: String,

    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// System prompt
    pub system: Option<String>,

    /// Maximum tokens in response
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Sequences that end generation early
    pub stop_sequences: Vec<String>,

    /// Tools available for the model to use
    pub tools: Vec<ToolDefinition>,

    /// How to handle tool choice
    pub tool_choice: ToolChoice,
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Response ID
    pub id: String,

    /// Model used
    pub model: String,

    /// Response content
    pub content: Vec<ContentBlockResponse>,

    /// Stop reason
    pub stop_reason: Option<StopReason>,

    /// Token usage
    pub usage: Usage,
}

/// A content block in the response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockResponse {
    /// Text content
    Text { text: String },

    /// Tool use request
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of message
    EndTurn,
    /// Hit max tokens
    MaxTokens,
    /// Wants to use a tool
    ToolUse,
    /// Stop sequence hit
    StopSequence,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens
    pub input_tokens: u32,
    /// Output tokens
    pub output_tokens: u32,
}

/// Tool definition for the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema)
    pub input_schema: ToolInputSchema,
}

/// Input schema for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Schema type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Property definitions
    pub properties: serde_json::Value,

    /// Required properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// How the model should choose to use tools
#[derive(Debug, Clone, Default)]
pub enum ToolChoice {
    /// Let the model decide
    #[default]
    Auto,
    /// Don't use any tools
    None,
    /// Must use a tool
    Required,
}

/// Information about a model
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,

    /// Human-readable name
    pub display_name: String,

    /// Maximum context window in tokens
    pub context_window: u32,

    /// Maximum output tokens
    pub max_output_tokens: u32,

    /// Whether the model supports tool use
    pub supports_tools: bool,
}

impl CompletionRequest {
    /// Create a new completion request
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            system: None,
            max_tokens: 2048,
            temperature: 0.1,
            stop_sequences: vec![],
            tools: vec![],
            tool_choice: ToolChoice::Auto,
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set stop sequences
    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    /// Set tools
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set tool choice
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }
}

impl CompletionResponse {
    /// Concatenate all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlockResponse::Text { text } => Some(text.as_str()),
                ContentBlockResponse::ToolUse { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool use requests as `(id, name, input)` tuples
    pub fn tool_uses(&self) -> Vec<(String, String, serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlockResponse::ToolUse { id, name, input } => {
                    Some((id.clone(), name.clone(), input.clone()))
                }
                ContentBlockResponse::Text { .. } => None,
            })
            .collect()
    }
}

impl Usage {
    /// Get total tokens used
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::Message;

    #[test]
    fn test_completion_request_new() {
        let request = CompletionRequest::new("qwen2.5-coder:7b", vec![Message::user("Hello")]);

        assert_eq!(request.model, "qwen2.5-coder:7b");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, 2048);
        assert!((request.temperature - 0.1).abs() < 0.001);
        assert!(request.system.is_none());
        assert!(request.stop_sequences.is_empty());
        assert!(request.tools.is_empty());
    }

    #[test]
    fn test_completion_request_builders() {
        let request = CompletionRequest::new("m", vec![])
            .with_system("sys")
            .with_max_tokens(512)
            .with_temperature(0.0)
            .with_stop_sequences(vec!["// SKIP".to_string()])
            .with_tool_choice(ToolChoice::None);

        assert_eq!(request.system.as_deref(), Some("sys"));
        assert_eq!(request.max_tokens, 512);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.stop_sequences, vec!["// SKIP".to_string()]);
        assert!(matches!(request.tool_choice, ToolChoice::None));
    }

    #[test]
    fn test_completion_response_text_joins_blocks() {
        let response = CompletionResponse {
            id: "1".to_string(),
            model: "m".to_string(),
            content: vec![
                ContentBlockResponse::Text {
                    text: "a".to_string(),
                },
                ContentBlockResponse::ToolUse {
                    id: "t".to_string(),
                    name: "grep".to_string(),
                    input: serde_json::json!({}),
                },
                ContentBlockResponse::Text {
                    text: "b".to_string(),
                },
            ],
            stop_reason: Some(StopReason::EndTurn),
            usage: Usage::default(),
        };

        assert_eq!(response.text(), "ab");
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "grep");
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total_tokens(), 150);
    }

    #[test]
    fn test_stop_reason_serialization() {
        let json = serde_json::to_string(&StopReason::StopSequence).unwrap();
        assert_eq!(json, "\"stop_sequence\"");
    }
}
