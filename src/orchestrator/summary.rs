// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::collections::BTreeMap;

use serde::Serialize;

use super::events::ChunkOutcome;
use crate::planner::SkipReason;

/// Final line for one chunk, or for a file skipped during planning
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryLine {
    pub chunk_id: Option<String>,
    pub status: &'static str,
    pub reason: String,
    pub resumed: bool,
}

/// Counts and per-file reasons for a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub written: usize,
    pub exists: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Chunks taken from an earlier interrupted run, also counted above
    pub resumed: usize,
    pub files: BTreeMap<String, Vec<SummaryLine>>,
}

impl RunSummary {
    pub fn record_file_skip(&mut self, rel_path: &str, reason: SkipReason) {
        self.skipped += 1;
        self.files
            .entry(rel_path.to_string())
            .or_default()
            .push(SummaryLine {
                chunk_id: None,
                status: "skip",
                reason: reason.to_string(),
                resumed: false,
            });
    }

    pub fn record_chunk(
        &mut self,
        rel_path: &str,
        chunk_id: &str,
        outcome: &ChunkOutcome,
        resumed: bool,
    ) {
        match outcome {
            ChunkOutcome::Written { .. } => self.written += 1,
            ChunkOutcome::Exists { .. } => self.exists += 1,
            ChunkOutcome::Skipped { .. } => self.skipped += 1,
            ChunkOutcome::Failed { .. } => self.failed += 1,
        }
        if resumed {
            self.resumed += 1;
        }

        let lines = self.files.entry(rel_path.to_string()).or_default();
        lines.push(SummaryLine {
            chunk_id: Some(chunk_id.to_string()),
            status: outcome.label(),
            reason: outcome.reason(),
            resumed,
        });
        lines.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
    }

    /// Chunks that reached a terminal outcome
    pub fn chunk_total(&self) -> usize {
        self.files
            .values()
            .flatten()
            .filter(|line| line.chunk_id.is_some())
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
