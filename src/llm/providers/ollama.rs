// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Ollama local model provider implementation
//!
//! Implements the LlmProvider trait against Ollama's non-streaming `/api/chat`
//! endpoint, with native tool calls, stop sequences, and a context-window
//! probe through `/api/show`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ForgeError, Result};
use crate::llm::message::{ContentBlock, Message, MessageContent, Role};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, ContentBlockResponse, LlmProvider, ModelInfo,
    ToolDefinition, Usage,
};
use crate::llm::providers::common::{
    build_client, is_blank_reply, resolve_stop_reason, server_error, transport_error,
};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const UNREACHABLE_HINT: &str = "Ollama is not running. Start the Ollama app or run 'ollama serve'";

/// Ollama local model provider
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default base URL (http://localhost:11434)
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    /// Check if Ollama is running and reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => Err(transport_error(e, UNREACHABLE_HINT)),
        }
    }

    /// Convert internal messages to Ollama format
    fn convert_messages(&self, messages: &[Message], system: Option<&str>) -> Vec<OllamaMessage> {
        let mut result = Vec::new();

        if let Some(sys) = system {
            result.push(OllamaMessage::text("system", sys));
        }

        for m in messages.iter().filter(|m| m.role != Role::System) {
            let role = m.role.to_string();

            match &m.content {
                MessageContent::Text(text) => result.push(OllamaMessage::text(&role, text)),
                MessageContent::Blocks(blocks) => {
                    let mut text_parts: Vec<&str> = Vec::new();
                    let mut tool_calls: Vec<OllamaToolCall> = Vec::new();
                    let mut tool_results: Vec<&str> = Vec::new();

                    for block in blocks {
                        match block {
                            ContentBlock::Text { text } => text_parts.push(text),
                            // Ollama has no tool call ids; results are matched by order
                            ContentBlock::ToolUse { name, input, .. } => {
                                tool_calls.push(OllamaToolCall {
                                    function: OllamaFunctionCall {
                                        name: name.clone(),
                                        arguments: input.clone(),
                                    },
                                })
                            }
                            ContentBlock::ToolResult { content, .. } => tool_results.push(content),
                        }
                    }

                    if !text_parts.is_empty() || !tool_calls.is_empty() {
                        result.push(OllamaMessage {
                            role: role.clone(),
                            content: text_parts.join("\n"),
                            tool_calls: if tool_calls.is_empty() {
                                None
                            } else {
                                Some(tool_calls)
                            },
                        });
                    }

                    for content in tool_results {
                        result.push(OllamaMessage::text("tool", content));
                    }
                }
            }
        }

        result
    }

    /// Convert tools to Ollama format
    fn convert_tools(&self, tools: &[ToolDefinition]) -> Vec<OllamaTool> {
        tools
            .iter()
            .map(|t| OllamaTool {
                tool_type: "function".to_string(),
                function: OllamaFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: serde_json::json!({
                        "type": t.input_schema.schema_type,
                        "properties": t.input_schema.properties,
                        "required": t.input_schema.required,
                    }),
                },
            })
            .collect()
    }

    /// Build the request body
    fn build_request(&self, request: &CompletionRequest) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            messages: self.convert_messages(&request.messages, request.system.as_deref()),
            stream: false,
            options: OllamaOptions {
                temperature: Some(request.temperature),
                num_predict: Some(request.max_tokens as i64),
                stop: if request.stop_sequences.is_empty() {
                    None
                } else {
                    Some(request.stop_sequences.clone())
                },
            },
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(self.convert_tools(&request.tools))
            },
        }
    }

    /// Parse an error response
    fn parse_error(&self, status: u16, body: &str) -> ForgeError {
        match serde_json::from_str::<OllamaError>(body) {
            Ok(error_response) => {
                let message = error_response.error;
                if message.contains("model") && message.contains("not found") {
                    ForgeError::Api(ApiError::ModelNotFound(message))
                } else {
                    server_error(status, message)
                }
            }
            Err(_) => server_error(status, body),
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the effective context length out of an `/api/show` body.
///
/// A `num_ctx` parameter set on the model wins over the architecture maximum.
fn context_from_show(show: &OllamaShowResponse) -> Option<u32> {
    let from_params = show.parameters.as_deref().and_then(|params| {
        params.lines().find_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("num_ctx"), Some(value)) => value.parse::<u32>().ok(),
                _ => None,
            }
        })
    });

    from_params.or_else(|| {
        show.model_info.as_ref().and_then(|info| {
            info.iter()
                .find(|(key, _)| key.ends_with(".context_length"))
                .and_then(|(_, value)| value.as_u64())
                .map(|n| n.min(u32::MAX as u64) as u32)
        })
    })
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        // Actual availability depends on what has been pulled
        vec![
            ModelInfo {
                id: "qwen2.5-coder:7b".to_string(),
                display_name: "Qwen 2.5 Coder 7B".to_string(),
                context_window: 32_768,
                max_output_tokens: 8_192,
                supports_tools: true,
            },
            ModelInfo {
                id: "qwen2.5-coder:14b".to_string(),
                display_name: "Qwen 2.5 Coder 14B".to_string(),
                context_window: 32_768,
                max_output_tokens: 8_192,
                supports_tools: true,
            },
            ModelInfo {
                id: "llama3.2:latest".to_string(),
                display_name: "Llama 3.2".to_string(),
                context_window: 128_000,
                max_output_tokens: 8_192,
                supports_tools: true,
            },
            ModelInfo {
                id: "codellama:latest".to_string(),
                display_name: "Code Llama".to_string(),
                context_window: 16_384,
                max_output_tokens: 4_096,
                supports_tools: false,
            },
        ]
    }

    fn supports_model(&self, model: &str) -> bool {
        // Any pulled model works; availability is checked at request time
        !model.is_empty()
    }

    async fn context_window(&self, model: &str) -> Result<Option<u32>> {
        let url = format!("{}/api/show", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "model": model }))
            .send()
            .await
            .map_err(|e| transport_error(e, UNREACHABLE_HINT))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status, &body));
        }

        let show: OllamaShowResponse = response.json().await?;
        Ok(context_from_show(&show).or_else(|| self.get_model_info(model).map(|m| m.context_window)))
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_request(&request);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, UNREACHABLE_HINT))?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status, &body));
        }

        let api_response: OllamaResponse = response.json().await.map_err(|e| {
            ForgeError::Api(ApiError::InvalidResponse(format!(
                "Failed to parse Ollama response: {}",
                e
            )))
        })?;

        let mut content: Vec<ContentBlockResponse> = Vec::new();
        let text_is_blank = is_blank_reply(&api_response.message.content);

        if !api_response.message.content.is_empty() {
            content.push(ContentBlockResponse::Text {
                text: api_response.message.content,
            });
        }

        let tool_calls = api_response.message.tool_calls.unwrap_or_default();
        let has_tool_calls = !tool_calls.is_empty();
        for (idx, tc) in tool_calls.into_iter().enumerate() {
            content.push(ContentBlockResponse::ToolUse {
                id: format!("tool_{}", idx),
                name: tc.function.name,
                input: tc.function.arguments,
            });
        }

        let finish = if api_response.done {
            Some(api_response.done_reason.as_deref().unwrap_or("stop"))
        } else {
            None
        };
        let stop_reason = resolve_stop_reason(
            finish,
            has_tool_calls,
            text_is_blank,
            !request.stop_sequences.is_empty(),
        );

        Ok(CompletionResponse {
            id: format!("ollama-{}", uuid::Uuid::new_v4()),
            model: request.model,
            content,
            stop_reason,
            usage: Usage {
                input_tokens: api_response.prompt_eval_count.unwrap_or(0) as u32,
                output_tokens: api_response.eval_count.unwrap_or(0) as u32,
            },
        })
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OllamaTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

impl OllamaMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_calls: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OllamaFunctionCall {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaShowResponse {
    #[serde(default)]
    parameters: Option<String>,
    #[serde(default)]
    model_info: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}
