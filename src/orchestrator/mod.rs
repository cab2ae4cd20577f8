// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Generation orchestrator
//!
//! Drives every planned chunk through
//! prompt → generate → extract → verify → (execute) → accept, retrying with
//! feedback until the attempt budget runs out and the chunk is abandoned.
//! Attempts of one chunk are strictly sequential; independent chunks share
//! a bounded worker pool. Every transition is published as a
//! [`GenerationEvent`].

pub mod events;
pub mod extract;
pub mod summary;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::sync::OwnedMutexGuard;

use crate::agent::{PlanRequest, PlanningAgent, TestPlan};
use crate::config::GenerationConfig;
use crate::llm::message::Message;
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::llm::retry::{with_retry, RetryConfig};
use crate::planner::{Chunk, WorkItem, WorkPlan};
use crate::project::{destination_for, SourceUnit};
use crate::prompt::{fit_prompt, PromptInput, SYSTEM_PROMPT};
use crate::runner::{RunRequest, TestRunner};
use crate::state::RunStateManager;
use crate::syntax::relative_specifier;
use crate::tools::ToolContext;
use crate::utils::{format_error, summarize_failure};
use crate::verify::{AmbientEnvironment, Verifier};

pub use events::{ChannelSink, ChunkOutcome, EventBus, EventSink, GenerationEvent, TracingSink};
pub use extract::{extract, Extraction};
pub use summary::{RunSummary, SummaryLine};

/// Feedback when a response holds no code unit
pub const NO_CODE_BLOCK: &str = "No code block found in response";

/// Feedback when the candidate declares no test cases
pub const NO_TEST_CASES: &str = "No test cases (it/test) were found in the generated file.";

/// Skip reason when the backend answers with the skip sentinel
pub const MODEL_RETURNED_NO_CODE: &str = "Model returned no code";

/// Lines and characters kept when summarizing a failure for the user
const SUMMARY_LINES: usize = 3;
const SUMMARY_CHARS: usize = 200;

/// Knobs of the per-chunk loop
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub model: String,
    pub max_attempts: u32,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub concurrency: usize,
    pub skip_sentinel: String,
    pub test_dir: String,
    pub force: bool,
    pub execute: bool,
}

impl GenerationOptions {
    pub fn from_config(model: impl Into<String>, config: &GenerationConfig) -> Self {
        Self {
            model: model.into(),
            max_attempts: config.max_attempts,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            concurrency: config.concurrency,
            skip_sentinel: config.skip_sentinel.clone(),
            test_dir: config.test_dir.clone(),
            force: config.force,
            execute: config.execute,
        }
    }
}

/// One async lock per destination path
#[derive(Default)]
pub struct DestinationLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl DestinationLocks {
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(locks.entry(path.to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Per-run values shared by every chunk
struct RunContext<'a> {
    plan: &'a WorkPlan,
    verifier: Verifier,
    tools: ToolContext,
}

struct ChunkReport {
    rel_path: String,
    chunk_id: String,
    outcome: ChunkOutcome,
    resumed: bool,
}

/// Failure of one attempt, fed into the next prompt
enum AttemptFailure {
    Retry(String),
    /// Nothing more to try for this chunk
    Abandon(String),
}

pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    retry: RetryConfig,
    runner: Option<Arc<dyn TestRunner>>,
    agent: Option<PlanningAgent>,
    events: EventBus,
    state: Option<Arc<RunStateManager>>,
    locks: DestinationLocks,
    project_root: PathBuf,
    output_root: PathBuf,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        options: GenerationOptions,
        project_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            options,
            retry: RetryConfig::default(),
            runner: None,
            agent: None,
            events: EventBus::new(),
            state: None,
            locks: DestinationLocks::default(),
            project_root: project_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Runner used when `execute` is on
    pub fn with_runner(mut self, runner: Arc<dyn TestRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_agent(mut self, agent: PlanningAgent) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Resume from and persist to `state`
    pub fn with_state(mut self, state: Arc<RunStateManager>) -> Self {
        self.events.subscribe(state.clone());
        self.state = Some(state);
        self
    }

    pub fn subscribe(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events.subscribe(sink);
        self
    }

    /// Generate tests for every chunk of `plan`.
    ///
    /// Per-chunk failures end up in the summary; nothing here is fatal.
    pub async fn run(&self, plan: &WorkPlan, files: Arc<Vec<SourceUnit>>) -> RunSummary {
        self.events.emit(GenerationEvent::PlanReady {
            signature: crate::planner::PlanSignature::of(plan).to_string(),
            files: plan.active_items().count(),
            chunks: plan.chunk_count(),
            skipped_files: plan.skipped_count(),
        });

        let mut summary = RunSummary::default();
        for item in &plan.items {
            if let Some(reason) = item.skip_reason {
                self.events.emit(GenerationEvent::FileSkipped {
                    rel_path: item.rel_path.clone(),
                    reason,
                });
                summary.record_file_skip(&item.rel_path, reason);
            }
        }

        let ctx = RunContext {
            plan,
            verifier: Verifier::new(AmbientEnvironment::for_framework(plan.test_framework)),
            tools: ToolContext::new(self.project_root.clone(), files),
        };

        let work: Vec<(&WorkItem, &Chunk)> = plan
            .active_items()
            .flat_map(|item| item.chunks.iter().map(move |chunk| (item, chunk)))
            .collect();

        let reports: Vec<ChunkReport> = stream::iter(work)
            .map(|(item, chunk)| self.process_chunk(&ctx, item, chunk))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        for report in &reports {
            summary.record_chunk(
                &report.rel_path,
                &report.chunk_id,
                &report.outcome,
                report.resumed,
            );
        }

        self.events.emit(GenerationEvent::RunFinished {
            summary: summary.clone(),
        });
        summary
    }

    fn destination(&self, item: &WorkItem, chunk: &Chunk) -> PathBuf {
        let label = item.is_multi_chunk().then_some(chunk.label.as_str());
        destination_for(
            &self.output_root,
            &item.rel_path,
            label,
            &self.options.test_dir,
        )
    }

    async fn process_chunk(
        &self,
        ctx: &RunContext<'_>,
        item: &WorkItem,
        chunk: &Chunk,
    ) -> ChunkReport {
        let destination = self.destination(item, chunk);

        let resumed = self
            .state
            .as_ref()
            .and_then(|state| state.completed(&item.rel_path, &chunk.id));
        if let Some(record) = resumed {
            return self.finish(item, chunk, record.to_outcome(&destination), true, None, None);
        }

        let _guard = self.locks.acquire(&destination).await;

        if !self.options.force && destination.exists() {
            return self.finish(
                item,
                chunk,
                ChunkOutcome::Exists { path: destination },
                false,
                None,
                None,
            );
        }

        self.events.emit(GenerationEvent::ChunkStarted {
            rel_path: item.rel_path.clone(),
            chunk_id: chunk.id.clone(),
            label: chunk.label.clone(),
        });

        let started = Instant::now();
        let test_plan = self.plan_tests(ctx, item, chunk).await;
        let (outcome, tokens) = self
            .generate(ctx, item, chunk, &destination, test_plan.as_ref())
            .await;

        self.finish(
            item,
            chunk,
            outcome,
            false,
            Some(tokens),
            Some(started.elapsed().as_millis() as u64),
        )
    }

    fn finish(
        &self,
        item: &WorkItem,
        chunk: &Chunk,
        outcome: ChunkOutcome,
        resumed: bool,
        tokens: Option<u32>,
        duration_ms: Option<u64>,
    ) -> ChunkReport {
        self.events.emit(GenerationEvent::ChunkFinished {
            rel_path: item.rel_path.clone(),
            chunk_id: chunk.id.clone(),
            outcome: outcome.clone(),
            resumed,
            tokens,
            duration_ms,
        });
        ChunkReport {
            rel_path: item.rel_path.clone(),
            chunk_id: chunk.id.clone(),
            outcome,
            resumed,
        }
    }

    /// Ask the planning agent for a test plan. Failures only cost the plan.
    async fn plan_tests(
        &self,
        ctx: &RunContext<'_>,
        item: &WorkItem,
        chunk: &Chunk,
    ) -> Option<TestPlan> {
        let agent = self.agent.as_ref()?;
        let request = PlanRequest {
            rel_path: &item.rel_path,
            label: &chunk.label,
            kind: chunk.kind,
            code: &chunk.code,
            framework: ctx.plan.test_framework,
        };

        match agent.plan(&request, &ctx.tools).await {
            Ok(run) => {
                self.events.emit(GenerationEvent::PlanningFinished {
                    rel_path: item.rel_path.clone(),
                    chunk_id: chunk.id.clone(),
                    cases: run.plan.cases.len(),
                    tool_calls: run.steps.len(),
                });
                Some(run.plan)
            }
            Err(e) => {
                if let Some(trace) = e.trace() {
                    tracing::debug!(chunk = %chunk.id, %trace, "planning trace");
                }
                self.events.emit(GenerationEvent::PlanningFailed {
                    rel_path: item.rel_path.clone(),
                    chunk_id: chunk.id.clone(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// The retry loop. Returns the outcome and the tokens spent.
    async fn generate(
        &self,
        ctx: &RunContext<'_>,
        item: &WorkItem,
        chunk: &Chunk,
        destination: &Path,
        test_plan: Option<&TestPlan>,
    ) -> (ChunkOutcome, u32) {
        let import_specifier = destination
            .parent()
            .map(|dir| relative_specifier(dir, &self.project_root.join(&item.rel_path)));
        let max_attempts = self.options.max_attempts.max(1);

        let mut previous: Option<String> = None;
        let mut feedback: Option<String> = None;
        let mut tokens = 0u32;
        let mut written = false;

        for attempt in 1..=max_attempts {
            self.events.emit(GenerationEvent::AttemptStarted {
                rel_path: item.rel_path.clone(),
                chunk_id: chunk.id.clone(),
                attempt,
            });

            let input = PromptInput {
                framework: ctx.plan.test_framework,
                renderer: ctx.plan.ui_renderer,
                rel_path: &item.rel_path,
                kind: chunk.kind,
                label: &chunk.label,
                code: &chunk.code,
                import_specifier: import_specifier.as_deref(),
                skip_sentinel: &self.options.skip_sentinel,
                attempt,
                previous_candidate: previous.as_deref(),
                failure_feedback: feedback.as_deref(),
                plan: test_plan,
            };

            let result = self
                .attempt(ctx, &input, destination, &mut tokens, &mut written)
                .await;

            let failure = match result {
                Ok(outcome) => {
                    if !matches!(outcome, ChunkOutcome::Written { .. }) && written {
                        remove_partial(destination);
                    }
                    return (outcome, tokens);
                }
                Err((AttemptFailure::Abandon(reason), _)) => {
                    if written {
                        remove_partial(destination);
                    }
                    return (
                        ChunkOutcome::Failed {
                            reason: summarize_failure(&reason, SUMMARY_LINES, SUMMARY_CHARS),
                            attempts: attempt,
                        },
                        tokens,
                    );
                }
                Err((AttemptFailure::Retry(reason), candidate)) => {
                    if candidate.is_some() {
                        previous = candidate;
                    }
                    reason
                }
            };

            self.events.emit(GenerationEvent::AttemptFailed {
                rel_path: item.rel_path.clone(),
                chunk_id: chunk.id.clone(),
                attempt,
                reason: summarize_failure(&failure, SUMMARY_LINES, SUMMARY_CHARS),
            });
            feedback = Some(failure);
        }

        if written {
            remove_partial(destination);
        }
        let last = feedback.unwrap_or_default();
        (
            ChunkOutcome::Failed {
                reason: summarize_failure(&last, SUMMARY_LINES, SUMMARY_CHARS),
                attempts: max_attempts,
            },
            tokens,
        )
    }

    /// One generate → extract → verify → execute pass.
    ///
    /// `Ok` is terminal. `Err` carries the failure and the candidate it was
    /// raised for, if any.
    async fn attempt(
        &self,
        ctx: &RunContext<'_>,
        input: &PromptInput<'_>,
        destination: &Path,
        tokens: &mut u32,
        written: &mut bool,
    ) -> std::result::Result<ChunkOutcome, (AttemptFailure, Option<String>)> {
        let (prompt, degraded) = fit_prompt(input, ctx.plan.context_budget);
        if degraded {
            tracing::debug!(file = %input.rel_path, label = %input.label, "code degraded to fit the prompt budget");
        }

        let mut request = CompletionRequest::new(self.options.model.clone(), vec![Message::user(prompt)])
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(self.options.max_output_tokens)
            .with_temperature(self.options.temperature);
        if !self.options.skip_sentinel.is_empty() {
            request = request.with_stop_sequences(vec![self.options.skip_sentinel.clone()]);
        }

        let response = with_retry(
            || self.provider.complete(request.clone()),
            Some(self.retry.clone()),
            "generate tests",
        )
        .await
        .map_err(|e| (AttemptFailure::Abandon(format_error(&e)), None))?;
        *tokens = tokens.saturating_add(response.usage.total_tokens());

        let code = match extract(
            &response.text(),
            &self.options.skip_sentinel,
            response.stop_reason,
        ) {
            Extraction::Skip => {
                return Ok(ChunkOutcome::Skipped {
                    reason: MODEL_RETURNED_NO_CODE.to_string(),
                })
            }
            Extraction::Nothing => {
                return Err((AttemptFailure::Retry(NO_CODE_BLOCK.to_string()), None))
            }
            Extraction::Code(code) => code,
        };

        let verified = ctx.verifier.verify(&code, destination);
        let candidate = Some(verified.normalized_code.clone());
        if !verified.diagnostics.is_empty() {
            return Err((
                AttemptFailure::Retry(verified.diagnostic_messages().join("\n")),
                candidate,
            ));
        }
        if verified.test_case_count == 0 {
            return Err((AttemptFailure::Retry(NO_TEST_CASES.to_string()), candidate));
        }

        if let Err(e) = write_candidate(destination, &verified.normalized_code) {
            return Err((
                AttemptFailure::Abandon(format!(
                    "Failed to write {}: {}",
                    destination.display(),
                    e
                )),
                candidate,
            ));
        }
        *written = true;

        let accepted = ChunkOutcome::Written {
            path: destination.to_path_buf(),
            attempts: input.attempt,
            test_cases: verified.test_case_count,
        };

        let runner = match (&self.runner, self.options.execute) {
            (Some(runner), true) => runner,
            _ => return Ok(accepted),
        };

        let report = runner
            .run(&RunRequest {
                project_root: self.project_root.clone(),
                test_file: destination.to_path_buf(),
                framework: ctx.plan.test_framework,
            })
            .await;

        if report.ok {
            return Ok(accepted);
        }

        let failure = if report.runner_missing {
            format!("Test runner unavailable: {}", report.output.trim())
        } else {
            format!("Test run failed (`{}`):\n{}", report.command, report.output.trim())
        };
        Err((AttemptFailure::Retry(failure), candidate))
    }
}

fn write_candidate(destination: &Path, code: &str) -> std::io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(destination, code)
}

fn remove_partial(destination: &Path) {
    match fs::remove_file(destination) {
        Ok(()) => tracing::debug!(path = %destination.display(), "removed partial test file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %destination.display(), error = %e, "failed to remove partial test file"),
    }
}

/// Human-readable rendering of a plan for dry runs
pub fn describe_plan(plan: &WorkPlan) -> String {
    let mut out = format!(
        "Plan: {} file(s), {} chunk(s), {} skipped; budget {} tokens ({} per chunk); {} / {}\n",
        plan.active_items().count(),
        plan.chunk_count(),
        plan.skipped_count(),
        plan.context_budget,
        plan.chunk_budget,
        plan.test_framework.as_str(),
        plan.ui_renderer.as_str(),
    );
    for item in &plan.items {
        match item.skip_reason {
            Some(reason) => out.push_str(&format!("  skip  {} ({})\n", item.rel_path, reason)),
            None => {
                out.push_str(&format!(
                    "  file  {} (~{} tokens)\n",
                    item.rel_path, item.original_token_count
                ));
                for chunk in &item.chunks {
                    out.push_str(&format!(
                        "        {} {} (~{} tokens)\n",
                        chunk.kind, chunk.label, chunk.approx_tokens
                    ));
                }
            }
        }
    }
    out
}
