// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Token budget derivation and the per-file work plan

use std::fmt;

use serde::{Deserialize, Serialize};

use super::chunker::{self, Chunk};
use crate::config::PlanningConfig;
use crate::project::{ScanResult, TestFramework, TestSetup, UiRenderer};
use crate::syntax::{self, Dialect};
use crate::utils::estimate_tokens;

/// Budget knobs, taken from [`PlanningConfig`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetPolicy {
    pub context_fraction: f64,
    pub floor: u32,
    pub prompt_overhead: u32,
    pub min_file_tokens: u32,
}

impl From<&PlanningConfig> for BudgetPolicy {
    fn from(config: &PlanningConfig) -> Self {
        Self {
            context_fraction: config.context_fraction,
            floor: config.budget_floor,
            prompt_overhead: config.prompt_overhead,
            min_file_tokens: config.min_file_tokens,
        }
    }
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self::from(&PlanningConfig::default())
    }
}

impl BudgetPolicy {
    /// Share of the context window one prompt may use, never below the floor
    pub fn usable_budget(&self, context_window: u32) -> u32 {
        let share = (context_window as f64 * self.context_fraction).floor() as u32;
        share.max(self.floor)
    }

    /// Room left for code once the prompt scaffolding is reserved
    pub fn chunk_budget(&self, context_window: u32) -> u32 {
        self.usable_budget(context_window)
            .saturating_sub(self.prompt_overhead)
    }
}

/// Why a file gets no chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    TooSmall,
    TypesOnly,
    TooLarge,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::TooSmall => "File too small",
            SkipReason::TypesOnly => "Types-only file",
            SkipReason::TooLarge => "Too large to chunk",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One eligible source file and its chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub rel_path: String,
    pub original_token_count: u32,
    pub chunks: Vec<Chunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl WorkItem {
    /// Planned as more than one chunk, so outputs are named per declaration
    pub fn is_multi_chunk(&self) -> bool {
        self.chunks.len() > 1
    }
}

/// Everything one run will generate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkPlan {
    pub context_budget: u32,
    pub chunk_budget: u32,
    pub test_framework: TestFramework,
    pub ui_renderer: UiRenderer,
    pub items: Vec<WorkItem>,
}

impl WorkPlan {
    /// Items that have chunks to generate
    pub fn active_items(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.iter().filter(|item| item.skip_reason.is_none())
    }

    pub fn chunk_count(&self) -> usize {
        self.items.iter().map(|item| item.chunks.len()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.skip_reason.is_some())
            .count()
    }
}

/// Build the work plan for a scanned project.
///
/// Deterministic: the same scan, setup and context window give the same plan.
pub fn plan(
    scan: &ScanResult,
    setup: &TestSetup,
    context_window: u32,
    policy: &BudgetPolicy,
) -> WorkPlan {
    let context_budget = policy.usable_budget(context_window);
    let chunk_budget = policy.chunk_budget(context_window);

    let items = scan
        .files
        .iter()
        .map(|unit| {
            let tokens = estimate_tokens(&unit.text);
            let skip = if tokens < policy.min_file_tokens {
                Some(SkipReason::TooSmall)
            } else if syntax::is_types_only(&unit.text, Dialect::for_path(&unit.rel_path)) {
                Some(SkipReason::TypesOnly)
            } else {
                None
            };

            let (chunks, skip_reason) = match skip {
                Some(reason) => (Vec::new(), Some(reason)),
                None => {
                    let chunks = chunker::chunk(&unit.rel_path, &unit.text, chunk_budget);
                    if chunks.is_empty() {
                        (chunks, Some(SkipReason::TooLarge))
                    } else {
                        (chunks, None)
                    }
                }
            };

            if let Some(reason) = skip_reason {
                tracing::debug!(path = %unit.rel_path, tokens, %reason, "skipping file");
            }

            WorkItem {
                rel_path: unit.rel_path.clone(),
                original_token_count: tokens,
                chunks,
                skip_reason,
            }
        })
        .collect();

    WorkPlan {
        context_budget,
        chunk_budget,
        test_framework: setup.framework,
        ui_renderer: setup.renderer,
        items,
    }
}
