// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI-compatible API provider implementation
//!
//! Talks to any hosted `/chat/completions` endpoint that follows the OpenAI
//! wire format (OpenAI itself, OpenRouter, vLLM, LM Studio and friends).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ForgeError, Result};
use crate::llm::message::{ContentBlock, Message, MessageContent, Role};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, ContentBlockResponse, LlmProvider, ModelInfo,
    ToolChoice, ToolDefinition, Usage,
};
use crate::llm::providers::common::{
    build_client, is_blank_reply, parse_numeric_token_counts, parse_retry_after_seconds,
    resolve_stop_reason, server_error, transport_error,
};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

const UNREACHABLE_HINT: &str = "Could not reach the completion endpoint";

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a new provider against the default OpenAI endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_OPENAI_URL)
    }

    /// Create with a custom base URL (everything before `/chat/completions`)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Convert internal messages to OpenAI format
    fn convert_messages(&self, messages: &[Message], system: Option<&str>) -> Vec<OpenAiMessage> {
        let mut result = Vec::new();

        if let Some(sys) = system {
            result.push(OpenAiMessage::text("system", sys));
        }

        for m in messages.iter().filter(|m| m.role != Role::System) {
            let role = m.role.to_string();

            match &m.content {
                MessageContent::Text(text) => result.push(OpenAiMessage::text(&role, text)),
                MessageContent::Blocks(blocks) => {
                    let mut text_parts = Vec::new();
                    let mut tool_calls = Vec::new();
                    let mut tool_results = Vec::new();

                    for block in blocks {
                        match block {
                            ContentBlock::Text { text } => text_parts.push(text.clone()),
                            ContentBlock::ToolUse { id, name, input } => {
                                tool_calls.push(OpenAiToolCall {
                                    id: id.clone(),
                                    r#type: "function".to_string(),
                                    function: OpenAiFunctionCall {
                                        name: name.clone(),
                                        arguments: input.to_string(),
                                    },
                                })
                            }
                            ContentBlock::ToolResult {
                                tool_use_id,
                                content,
                                ..
                            } => tool_results.push((tool_use_id.clone(), content.clone())),
                        }
                    }

                    if !tool_calls.is_empty() || !text_parts.is_empty() {
                        result.push(OpenAiMessage {
                            role: role.clone(),
                            content: Some(text_parts.join("\n")),
                            tool_calls: if tool_calls.is_empty() {
                                None
                            } else {
                                Some(tool_calls)
                            },
                            tool_call_id: None,
                        });
                    }

                    for (tool_use_id, content) in tool_results {
                        result.push(OpenAiMessage {
                            role: "tool".to_string(),
                            content: Some(content),
                            tool_calls: None,
                            tool_call_id: Some(tool_use_id),
                        });
                    }
                }
            }
        }

        result
    }

    fn convert_tools(&self, tools: &[ToolDefinition]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .map(|t| OpenAiTool {
                r#type: "function".to_string(),
                function: OpenAiFunction {
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

    fn build_request(&self, request: &CompletionRequest) -> OpenAiRequest {
        let has_tools = !request.tools.is_empty();
        let tool_choice = match request.tool_choice {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
            ToolChoice::Required => "required",
        };

        OpenAiRequest {
            model: request.model.clone(),
            messages: self.convert_messages(&request.messages, request.system.as_deref()),
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
            stop: if request.stop_sequences.is_empty() {
                None
            } else {
                Some(request.stop_sequences.clone())
            },
            tools: has_tools.then(|| self.convert_tools(&request.tools)),
            tool_choice: has_tools.then(|| tool_choice.to_string()),
        }
    }

    fn parse_error(&self, status: u16, retry_after: Option<u64>, body: &str) -> ForgeError {
        if status == 401 || status == 403 {
            return ForgeError::Api(ApiError::AuthenticationFailed);
        }
        if status == 429 {
            return ForgeError::Api(ApiError::RateLimited(retry_after.unwrap_or(60) as u32));
        }

        let Ok(error_response) = serde_json::from_str::<OpenAiError>(body) else {
            return server_error(status, body);
        };

        let message = error_response.error.message;
        match error_response.error.code.as_deref().unwrap_or("") {
            "invalid_api_key" => ForgeError::Api(ApiError::AuthenticationFailed),
            "rate_limit_exceeded" => {
                ForgeError::Api(ApiError::RateLimited(retry_after.unwrap_or(60) as u32))
            }
            "context_length_exceeded" => {
                let (current, limit) = parse_numeric_token_counts(&message);
                ForgeError::Api(ApiError::ContextTooLong { current, limit })
            }
            "model_not_found" => ForgeError::Api(ApiError::ModelNotFound(message)),
            _ => server_error(status, message),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gpt-4o-mini".to_string(),
                display_name: "GPT-4o mini".to_string(),
                context_window: 128_000,
                max_output_tokens: 16_384,
                supports_tools: true,
            },
            ModelInfo {
                id: "gpt-4o".to_string(),
                display_name: "GPT-4o".to_string(),
                context_window: 128_000,
                max_output_tokens: 16_384,
                supports_tools: true,
            },
        ]
    }

    fn supports_model(&self, model: &str) -> bool {
        // Compatible servers host arbitrary model ids; the server validates
        !model.is_empty()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = self.build_request(&request);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, UNREACHABLE_HINT))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = parse_retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status, retry_after, &body));
        }

        let api_response: OpenAiResponse = response.json().await.map_err(|e| {
            ForgeError::Api(ApiError::InvalidResponse(format!(
                "Failed to parse completion response: {}",
                e
            )))
        })?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            ForgeError::Api(ApiError::InvalidResponse(
                "No choices in response".to_string(),
            ))
        })?;

        let mut content = Vec::new();
        let text = choice.message.content.unwrap_or_default();
        let text_is_blank = is_blank_reply(&text);
        if !text.is_empty() {
            content.push(ContentBlockResponse::Text { text });
        }

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        let has_tool_calls = !tool_calls.is_empty();
        for tc in tool_calls {
            let input = serde_json::from_str(&tc.function.arguments).map_err(|e| {
                ForgeError::Api(ApiError::InvalidResponse(format!(
                    "Tool call '{}' has malformed arguments: {}",
                    tc.function.name, e
                )))
            })?;
            content.push(ContentBlockResponse::ToolUse {
                id: tc.id,
                name: tc.function.name,
                input,
            });
        }

        let stop_reason = resolve_stop_reason(
            choice.finish_reason.as_deref(),
            has_tool_calls,
            text_is_blank,
            !request.stop_sequences.is_empty(),
        );

        let usage = api_response.usage.unwrap_or_default();

        Ok(CompletionResponse {
            id: api_response.id,
            model: api_response.model.unwrap_or(request.model),
            content,
            stop_reason,
            usage: Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    r#type: String,
    function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    r#type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    code: Option<String>,
}
