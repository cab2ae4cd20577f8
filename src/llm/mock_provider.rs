// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock LLM provider for testing
//!
//! Provides a scripted implementation of the LlmProvider trait that can be
//! used in unit and integration tests without making real API calls.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, ContentBlockResponse, LlmProvider, ModelInfo,
    StopReason, Usage,
};

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    /// Provider name
    name: String,
    /// Configured responses
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded_requests: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Available models
    models: Vec<ModelInfo>,
}

/// A pre-configured response for the mock provider
#[derive(Clone, Debug)]
pub struct MockResponse {
    /// Text content to return
    pub text: String,
    /// Tool calls to return (optional)
    pub tool_calls: Vec<MockToolCall>,
    /// Stop reason
    pub stop_reason: StopReason,
    /// Token usage
    pub usage: Usage,
}

/// A mock tool call
#[derive(Clone, Debug)]
pub struct MockToolCall {
    /// Tool call ID
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool input (JSON)
    pub input: serde_json::Value,
}

impl MockResponse {
    /// A plain text response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// A response that ended on a stop sequence
    pub fn stopped(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            stop_reason: StopReason::StopSequence,
            ..Default::default()
        }
    }

    /// A single tool call response
    pub fn tool_call(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            text: String::new(),
            tool_calls: vec![MockToolCall {
                id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
                name: name.into(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
            usage: Usage::default(),
        }
    }
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            text: "Mock response".to_string(),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
            },
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(vec![MockResponse::default()])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
            models: vec![Self::default_model()],
        }
    }

    /// Create a default model info
    fn default_model() -> ModelInfo {
        ModelInfo {
            id: "mock-model".to_string(),
            display_name: "Mock Model".to_string(),
            context_window: 32_768,
            max_output_tokens: 4096,
            supports_tools: true,
        }
    }

    fn lock_responses(&self) -> MutexGuard<'_, Vec<MockResponse>> {
        match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Mock provider responses lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn lock_requests(&self) -> MutexGuard<'_, Vec<CompletionRequest>> {
        match self.recorded_requests.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Set the text response
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_scripted(vec![MockResponse::text(text)])
    }

    /// Queue multiple text responses (returned in order, last one repeats)
    pub fn with_responses(self, texts: Vec<String>) -> Self {
        self.with_scripted(texts.into_iter().map(MockResponse::text).collect())
    }

    /// Queue arbitrary scripted responses (returned in order, last one repeats)
    pub fn with_scripted(self, scripted: Vec<MockResponse>) -> Self {
        let mut responses = self.lock_responses();
        responses.clear();
        responses.extend(scripted);
        drop(responses);
        self
    }

    /// Set a tool call response
    pub fn with_tool_call(self, name: impl Into<String>, input: serde_json::Value) -> Self {
        self.with_scripted(vec![MockResponse::tool_call(name, input)])
    }

    /// Get the number of times complete() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.lock_requests().clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.lock_requests().last().cloned()
    }

    /// Reset call count and recorded requests
    pub fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        self.lock_requests().clear();
    }

    /// Get the next response
    fn next_response(&self) -> MockResponse {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = self.lock_responses();
        // Walk through responses, then keep returning the last one
        if responses.is_empty() {
            MockResponse::default()
        } else {
            responses[count.min(responses.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        self.models.clone()
    }

    fn supports_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m.id == model)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.lock_requests().push(request.clone());

        let response = self.next_response();

        let mut content = vec![];

        if !response.text.is_empty() {
            content.push(ContentBlockResponse::Text {
                text: response.text,
            });
        }

        for tool_call in response.tool_calls {
            content.push(ContentBlockResponse::ToolUse {
                id: tool_call.id,
                name: tool_call.name,
                input: tool_call.input,
            });
        }

        Ok(CompletionResponse {
            id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            model: request.model,
            content,
            stop_reason: Some(response.stop_reason),
            usage: response.usage,
        })
    }
}
