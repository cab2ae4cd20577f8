// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool-calling planning agent
//!
//! Before test code is generated, the backend may inspect the project
//! through the read-only tools in [`crate::tools`] and then answer with a
//! structured [`TestPlan`]. The loop is bounded by a tool-call budget;
//! running out of budget is a failure, distinct from an empty plan.

pub mod plan;

pub use plan::{TestCase, TestPlan};

use std::sync::Arc;

use thiserror::Error;

use crate::error::ForgeError;
use crate::llm::message::{ContentBlock, Message};
use crate::llm::provider::{CompletionRequest, ContentBlockResponse, LlmProvider, ToolChoice};
use crate::llm::retry::{with_retry, RetryConfig};
use crate::planner::ChunkKind;
use crate::project::TestFramework;
use crate::tools::{ToolContext, ToolRegistry, UnknownTool};
use crate::utils::truncate_end;

const AGENT_SYSTEM_PROMPT: &str = "You plan unit tests. Use the tools to inspect the project when the code alone is not enough: \
how a function is called, what a module exports, which props a component receives. The tools are read-only. \
When you are done, answer with JSON only, no tool call: \
{\"cases\":[{\"title\":\"...\",\"arrange\":\"...\",\"act\":\"...\",\"assert\":\"...\",\"mocks\":[\"...\"]}]}. \
Answer {\"cases\":[]} if nothing is worth testing.";

/// Why planning failed
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Malformed agent response: {reason}")]
    MalformedResponse { reason: String, trace: String },

    #[error("Unknown tool requested: {name}")]
    UnknownTool { name: String, trace: String },

    #[error("Agent exceeded the budget of {limit} tool calls")]
    StepBudgetExhausted { limit: usize, trace: String },

    #[error("Backend failure during planning: {0}")]
    Backend(#[from] ForgeError),
}

impl AgentError {
    /// Step trace leading up to the failure, when there is one
    pub fn trace(&self) -> Option<&str> {
        match self {
            AgentError::MalformedResponse { trace, .. }
            | AgentError::UnknownTool { trace, .. }
            | AgentError::StepBudgetExhausted { trace, .. } => Some(trace),
            AgentError::Backend(_) => None,
        }
    }
}

/// States of the planning loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    AwaitingResponse,
    ToolDispatch,
    TerminalPlan,
    TerminalError,
}

/// One tool call made during planning
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStep {
    pub tool: String,
    pub input: serde_json::Value,
    pub ok: bool,
}

/// Successful planning run
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub plan: TestPlan,
    pub steps: Vec<AgentStep>,
}

/// What to plan for
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub rel_path: &'a str,
    pub label: &'a str,
    pub kind: ChunkKind,
    pub code: &'a str,
    pub framework: TestFramework,
}

fn render_trace(steps: &[AgentStep], last: &str) -> String {
    let mut out = String::new();
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!(
            "step {}: {}({}) -> {}\n",
            i + 1,
            step.tool,
            truncate_end(&step.input.to_string(), 120),
            if step.ok { "ok" } else { "error" }
        ));
    }
    out.push_str(&format!("final: {}", truncate_end(last, 500)));
    out
}

/// Bounded tool-calling loop producing a [`TestPlan`]
pub struct PlanningAgent {
    provider: Arc<dyn LlmProvider>,
    model: String,
    registry: Arc<ToolRegistry>,
    max_tool_calls: usize,
    max_tokens: u32,
    temperature: f32,
    retry: RetryConfig,
}

impl PlanningAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        registry: Arc<ToolRegistry>,
        max_tool_calls: usize,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            registry,
            max_tool_calls,
            max_tokens: 1024,
            temperature: 0.1,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn opening_message(request: &PlanRequest<'_>) -> String {
        format!(
            "Plan {} tests for the {} `{}` in `{}`.\n\n```\n{}\n```\n",
            request.framework.as_str(),
            request.kind,
            request.label,
            request.rel_path,
            request.code.trim_end()
        )
    }

    /// Run the loop until a plan, a failure, or the tool budget runs out.
    pub async fn plan(
        &self,
        request: &PlanRequest<'_>,
        context: &ToolContext,
    ) -> std::result::Result<AgentRun, AgentError> {
        let mut messages = vec![Message::user(Self::opening_message(request))];
        let mut steps: Vec<AgentStep> = Vec::new();
        let mut state = AgentState::AwaitingResponse;
        let tools = self.registry.definitions();

        loop {
            debug_assert_eq!(state, AgentState::AwaitingResponse);
            let completion = CompletionRequest::new(self.model.clone(), messages.clone())
                .with_system(AGENT_SYSTEM_PROMPT)
                .with_max_tokens(self.max_tokens)
                .with_temperature(self.temperature)
                .with_tools(tools.clone())
                .with_tool_choice(ToolChoice::Auto);

            let response = with_retry(
                || self.provider.complete(completion.clone()),
                Some(self.retry.clone()),
                "agent completion",
            )
            .await?;

            let tool_uses = response.tool_uses();
            if tool_uses.is_empty() {
                let text = response.text();
                return match TestPlan::parse(&text) {
                    Ok(plan) => {
                        state = AgentState::TerminalPlan;
                        tracing::debug!(
                            ?state,
                            cases = plan.cases.len(),
                            tool_calls = steps.len(),
                            "agent produced plan"
                        );
                        Ok(AgentRun { plan, steps })
                    }
                    Err(AgentError::MalformedResponse { reason, .. }) => {
                        state = AgentState::TerminalError;
                        tracing::debug!(?state, %reason, "agent answer unusable");
                        Err(AgentError::MalformedResponse {
                            reason,
                            trace: render_trace(&steps, &text),
                        })
                    }
                    Err(other) => Err(other),
                };
            }

            state = AgentState::ToolDispatch;
            let blocks: Vec<ContentBlock> = response
                .content
                .iter()
                .map(|block| match block {
                    ContentBlockResponse::Text { text } => ContentBlock::Text { text: text.clone() },
                    ContentBlockResponse::ToolUse { id, name, input } => ContentBlock::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    },
                })
                .collect();
            messages.push(Message::assistant_blocks(blocks));

            for (id, name, input) in tool_uses {
                if steps.len() >= self.max_tool_calls {
                    state = AgentState::TerminalError;
                    tracing::debug!(?state, limit = self.max_tool_calls, "tool budget exhausted");
                    return Err(AgentError::StepBudgetExhausted {
                        limit: self.max_tool_calls,
                        trace: render_trace(&steps, &format!("requested {}", name)),
                    });
                }

                let result = match self.registry.dispatch(&name, &id, &input, context).await {
                    Ok(result) => result,
                    Err(UnknownTool(unknown)) => {
                        state = AgentState::TerminalError;
                        tracing::debug!(?state, tool = %unknown, "unknown tool");
                        return Err(AgentError::UnknownTool {
                            trace: render_trace(&steps, &format!("requested {}", unknown)),
                            name: unknown,
                        });
                    }
                };

                tracing::debug!(?state, tool = %name, ok = !result.is_error(), "agent tool call");
                steps.push(AgentStep {
                    tool: name,
                    input,
                    ok: !result.is_error(),
                });
                messages.push(Message::tool_result(
                    id,
                    result.observation(),
                    result.is_error(),
                ));
            }

            state = AgentState::AwaitingResponse;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::MessageContent;
    use crate::llm::mock_provider::{MockProvider, MockResponse};
    use crate::tools::test_support::fixture;
    use serde_json::json;

    fn agent(provider: &MockProvider, max_tool_calls: usize) -> PlanningAgent {
        PlanningAgent::new(
            Arc::new(provider.clone()),
            "mock-model",
            Arc::new(ToolRegistry::with_builtins()),
            max_tool_calls,
        )
        .with_retry(RetryConfig::none())
    }

    fn request() -> PlanRequest<'static> {
        PlanRequest {
            rel_path: "src/math.ts",
            label: "add",
            kind: ChunkKind::Function,
            code: "export function add(a: number, b: number) { return a + b; }",
            framework: TestFramework::Vitest,
        }
    }

    #[tokio::test]
    async fn test_tool_call_then_plan() {
        let (_dir, context) = fixture();
        let provider = MockProvider::new().with_scripted(vec![
            MockResponse::tool_call("find_usages", json!({"identifier": "add"})),
            MockResponse::text(r#"{"cases":[{"title":"adds two numbers","act":"add(1, 2)","assert":"returns 3"}]}"#),
        ]);

        let run = agent(&provider, 4).plan(&request(), &context).await.unwrap();
        assert_eq!(run.plan.cases.len(), 1);
        assert_eq!(run.steps.len(), 1);
        assert!(run.steps[0].ok);
        assert_eq!(provider.call_count(), 2);

        // The observation was fed back before the second turn
        let second = &provider.recorded_requests()[1];
        let last = second.messages.last().unwrap();
        match &last.content {
            MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult { content, .. } => {
                    assert!(content.starts_with(r#"{"ok":true"#))
                }
                other => panic!("unexpected block {:?}", other),
            },
            other => panic!("unexpected content {:?}", other),
        }
        assert_eq!(second.tools.len(), 6);
    }

    #[tokio::test]
    async fn test_empty_plan_is_success() {
        let (_dir, context) = fixture();
        let provider = MockProvider::new().with_response(r#"{"cases": []}"#);
        let run = agent(&provider, 4).plan(&request(), &context).await.unwrap();
        assert!(run.plan.is_empty());
    }

    #[tokio::test]
    async fn test_tool_failure_is_observation_not_error() {
        let (_dir, context) = fixture();
        let provider = MockProvider::new().with_scripted(vec![
            MockResponse::tool_call("read_file", json!({"path": "src/missing.ts"})),
            MockResponse::text(r#"{"cases": []}"#),
        ]);
        let run = agent(&provider, 4).plan(&request(), &context).await.unwrap();
        assert!(!run.steps[0].ok);
    }

    #[tokio::test]
    async fn test_step_budget_exhausted() {
        let (_dir, context) = fixture();
        // The last scripted response repeats forever
        let provider = MockProvider::new()
            .with_tool_call("grep", json!({"pattern": "add"}));
        let err = agent(&provider, 3).plan(&request(), &context).await.unwrap_err();

        match err {
            AgentError::StepBudgetExhausted { limit, ref trace } => {
                assert_eq!(limit, 3);
                assert!(trace.contains("step 3: grep"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (_dir, context) = fixture();
        let provider = MockProvider::new().with_tool_call("write_file", json!({"path": "x"}));
        let err = agent(&provider, 3).plan(&request(), &context).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool { ref name, .. } if name == "write_file"));
        assert!(err.trace().is_some());
    }

    #[tokio::test]
    async fn test_malformed_answer_keeps_trace() {
        let (_dir, context) = fixture();
        let provider = MockProvider::new().with_scripted(vec![
            MockResponse::tool_call("list_exports", json!({"path": "src/math.ts"})),
            MockResponse::text("I think add should be tested."),
        ]);
        let err = agent(&provider, 3).plan(&request(), &context).await.unwrap_err();
        let trace = err.trace().unwrap();
        assert!(trace.contains("step 1: list_exports"));
        assert!(trace.contains("final: I think add"));
    }
}
