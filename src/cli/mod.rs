// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI module for testforge
//!
//! Argument parsing, terminal progress and the end-to-end run:
//! scan → detect setup → probe context → plan → generate → summarize.

pub mod args;
pub mod progress;

pub use args::*;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;

use crate::agent::PlanningAgent;
use crate::config::Settings;
use crate::llm::factory::ProviderFactory;
use crate::llm::provider::LlmProvider;
use crate::llm::retry::RetryConfig;
use crate::orchestrator::{
    describe_plan, ChannelSink, GenerationOptions, Orchestrator, RunSummary, TracingSink,
};
use crate::planner::{self, BudgetPolicy, WorkPlan};
use crate::project::{self, detect_test_setup};
use crate::runner::ProcessTestRunner;
use crate::state::{self, RunMode, RunStateManager};
use crate::tools::ToolRegistry;

/// Where the run publishes its state manager so a signal handler can flush it
pub type StateSlot = Arc<OnceLock<Arc<RunStateManager>>>;

/// Result of one invocation
#[derive(Debug)]
pub enum RunOutcome {
    /// Plan printed, nothing generated
    DryRun(WorkPlan),
    Completed(RunSummary),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::DryRun(_) => 0,
            RunOutcome::Completed(summary) if summary.has_failures() => 1,
            RunOutcome::Completed(_) => 0,
        }
    }
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Cannot determine the current directory")?;
    Ok(cwd.join(path))
}

fn resolve_roots(cli: &Cli) -> anyhow::Result<(PathBuf, PathBuf)> {
    let project = absolute(cli.project.as_deref().unwrap_or_else(|| Path::new(".")))?;
    let project = project
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", project.display()))?;
    let output = match &cli.out {
        Some(out) => absolute(out)?,
        None => project.clone(),
    };
    Ok((project, output))
}

async fn context_window(
    provider: Option<&Arc<dyn LlmProvider>>,
    model: &str,
    settings: &Settings,
) -> u32 {
    if let Some(size) = settings.planning.context_size {
        return size;
    }
    let fallback = settings.planning.fallback_context_window;
    let Some(provider) = provider else {
        return fallback;
    };
    match provider.context_window(model).await {
        Ok(Some(size)) => {
            tracing::info!(model, context_window = size, "probed context window");
            size
        }
        Ok(None) => fallback,
        Err(e) => {
            tracing::warn!(model, error = %e, fallback, "context probe failed");
            fallback
        }
    }
}

/// Run with the backend named in `settings`.
pub async fn run(cli: &Cli, mut settings: Settings, slot: StateSlot) -> anyhow::Result<RunOutcome> {
    settings.apply_overrides(&cli.overrides());
    settings.validate()?;

    let provider = if cli.dry_run {
        None
    } else {
        Some(
            ProviderFactory::create(&settings, true)
                .await
                .context("Cannot initialize the generative backend")?,
        )
    };
    run_with_provider(cli, settings, provider, slot).await
}

/// Run with an explicit backend. `None` is only valid for dry runs.
///
/// `settings` must already carry the command-line overrides.
pub async fn run_with_provider(
    cli: &Cli,
    settings: Settings,
    provider: Option<Arc<dyn LlmProvider>>,
    slot: StateSlot,
) -> anyhow::Result<RunOutcome> {
    let (project_root, output_root) = resolve_roots(cli)?;

    let scan = project::scan(&project_root, &cli.include, &cli.exclude)?;
    let setup = detect_test_setup(&project_root);
    let window = context_window(provider.as_ref(), &cli.model, &settings).await;
    let plan = planner::plan(
        &scan,
        &setup,
        window,
        &BudgetPolicy::from(&settings.planning),
    );

    if cli.dry_run {
        print!("{}", describe_plan(&plan));
        return Ok(RunOutcome::DryRun(plan));
    }

    let provider = provider.context("No generative backend available")?;

    std::fs::create_dir_all(&output_root).with_context(|| {
        format!("Cannot create output directory {}", output_root.display())
    })?;
    if cli.reset && state::reset(&output_root)? {
        tracing::info!("previous run state removed");
    }

    let mode = if settings.generation.execute {
        RunMode::Execute
    } else {
        RunMode::Static
    };
    let run_state = Arc::new(RunStateManager::open(
        &output_root,
        &plan,
        mode,
        Duration::from_millis(settings.state.debounce_ms),
    ));
    // Only one run per process
    let _ = slot.set(run_state.clone());

    let retry = RetryConfig::from(&settings.resilience);
    let (channel, rx) = ChannelSink::new();
    let mut orchestrator = Orchestrator::new(
        provider.clone(),
        GenerationOptions::from_config(&cli.model, &settings.generation),
        &project_root,
        &output_root,
    )
    .with_retry(retry.clone())
    .with_state(run_state.clone())
    .subscribe(Arc::new(TracingSink))
    .subscribe(Arc::new(channel));

    if settings.generation.execute {
        orchestrator = orchestrator.with_runner(Arc::new(ProcessTestRunner::new(
            Duration::from_secs(settings.generation.runner_timeout_secs),
        )));
    }
    if settings.agent.enabled {
        orchestrator = orchestrator.with_agent(
            PlanningAgent::new(
                provider,
                &cli.model,
                Arc::new(ToolRegistry::with_builtins()),
                settings.agent.max_tool_calls as usize,
            )
            .with_sampling(
                settings.generation.max_output_tokens,
                settings.generation.temperature,
            )
            .with_retry(retry),
        );
    }

    let display = progress::spawn_display(rx, plan.chunk_count());
    let summary = orchestrator.run(&plan, Arc::new(scan.files)).await;
    // Closes the event channel
    drop(orchestrator);
    if let Err(e) = display.await {
        tracing::debug!(error = %e, "progress display ended abnormally");
    }

    if let Err(e) = run_state.flush_now() {
        tracing::warn!(error = %e, "failed to write run state");
    }

    print!("{}", progress::render_summary(&summary));
    Ok(RunOutcome::Completed(summary))
}
