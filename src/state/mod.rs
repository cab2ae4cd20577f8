// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Run state persistence
//!
//! Records which `(file, chunk)` units reached a terminal outcome so an
//! interrupted run can resume without calling the backend again for them.
//! The file lives at `<output>/.testforge/run-state.json` and is tied to a
//! [`PlanSignature`]; a different plan, a different mode, or a file that
//! does not parse is treated as absent. Once every planned chunk is
//! terminal the file is deleted.
//!
//! Writes are coalesced: a change marks the state dirty and arms a single
//! timer. [`RunStateManager::flush_now`] writes synchronously and is called
//! on shutdown and from `Drop`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::orchestrator::{ChunkOutcome, EventSink, GenerationEvent};
use crate::planner::{PlanSignature, WorkPlan};

/// Directory under the output root holding testforge's own files
pub const STATE_DIR: &str = ".testforge";

/// Run state file name
pub const STATE_FILE: &str = "run-state.json";

/// Location of the run state file for an output root
pub fn state_path(output_root: &Path) -> PathBuf {
    output_root.join(STATE_DIR).join(STATE_FILE)
}

/// How candidates are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Static verification only
    Static,
    /// Static verification followed by the project's test runner
    Execute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Write,
    Skip,
    Exists,
}

/// Terminal record for one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRunRecord {
    pub status: ChunkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<usize>,
    pub updated_at: DateTime<Utc>,
}

impl ChunkRunRecord {
    /// Abandoned chunks are stored as `skip` with the failure as message.
    pub fn from_outcome(
        outcome: &ChunkOutcome,
        tokens: Option<u32>,
        duration_ms: Option<u64>,
    ) -> Self {
        let (status, attempts, test_cases) = match outcome {
            ChunkOutcome::Written {
                attempts,
                test_cases,
                ..
            } => (ChunkStatus::Write, Some(*attempts), Some(*test_cases)),
            ChunkOutcome::Exists { .. } => (ChunkStatus::Exists, None, None),
            ChunkOutcome::Skipped { .. } => (ChunkStatus::Skip, None, None),
            ChunkOutcome::Failed { attempts, .. } => (ChunkStatus::Skip, Some(*attempts), None),
        };
        Self {
            status,
            message: Some(outcome.reason()),
            tokens,
            duration_ms,
            attempts,
            test_cases,
            updated_at: Utc::now(),
        }
    }

    /// Outcome to report when the chunk is resumed instead of regenerated
    pub fn to_outcome(&self, destination: &Path) -> ChunkOutcome {
        match self.status {
            ChunkStatus::Write => ChunkOutcome::Written {
                path: destination.to_path_buf(),
                attempts: self.attempts.unwrap_or(1),
                test_cases: self.test_cases.unwrap_or(0),
            },
            ChunkStatus::Exists => ChunkOutcome::Exists {
                path: destination.to_path_buf(),
            },
            ChunkStatus::Skip => ChunkOutcome::Skipped {
                reason: self
                    .message
                    .clone()
                    .unwrap_or_else(|| "Skipped in an earlier run".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub files: usize,
    pub chunks: usize,
    pub written: usize,
    pub skipped: usize,
    pub exists: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRunState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub chunks: BTreeMap<String, ChunkRunRecord>,
}

/// On-disk document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub plan_signature: PlanSignature,
    pub mode: RunMode,
    pub totals: RunTotals,
    #[serde(default)]
    pub per_file: BTreeMap<String, FileRunState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(signature: PlanSignature, mode: RunMode, plan: &WorkPlan) -> Self {
        let now = Utc::now();
        Self {
            plan_signature: signature,
            mode,
            totals: RunTotals {
                files: plan.active_items().count(),
                chunks: plan.chunk_count(),
                ..Default::default()
            },
            per_file: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of chunks with a terminal record
    pub fn completed_chunks(&self) -> usize {
        self.per_file.values().map(|f| f.chunks.len()).sum()
    }

    fn recount(&mut self) {
        let mut written = 0;
        let mut skipped = 0;
        let mut exists = 0;
        for record in self.per_file.values().flat_map(|f| f.chunks.values()) {
            match record.status {
                ChunkStatus::Write => written += 1,
                ChunkStatus::Skip => skipped += 1,
                ChunkStatus::Exists => exists += 1,
            }
        }
        self.totals.written = written;
        self.totals.skipped = skipped;
        self.totals.exists = exists;
    }
}

/// Read the state file; anything unreadable counts as absent.
pub fn load(path: &Path) -> Option<RunState> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read run state, starting fresh");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt run state, starting fresh");
            None
        }
    }
}

/// Delete the state file under `output_root`. Returns whether one existed.
pub fn reset(output_root: &Path) -> Result<bool> {
    let path = state_path(output_root);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ForgeError::State(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

struct Inner {
    state: RunState,
    /// Planned chunk count per file
    planned: BTreeMap<String, usize>,
    dirty: bool,
    timer_armed: bool,
    /// Every chunk is terminal and the file is gone
    finished: bool,
}

struct Shared {
    path: PathBuf,
    debounce: Duration,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("run state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self, inner: &mut Inner) -> Result<()> {
        inner.timer_armed = false;
        if !inner.dirty || inner.finished {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&inner.state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        inner.dirty = false;
        tracing::debug!(path = %self.path.display(), "run state flushed");
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut inner = self.lock();
        self.write(&mut inner)
    }
}

/// Owns the run state of one run
pub struct RunStateManager {
    shared: Arc<Shared>,
    resumed_from: usize,
}

impl RunStateManager {
    /// Open the state for `plan`, reusing a matching state file.
    pub fn open(output_root: &Path, plan: &WorkPlan, mode: RunMode, debounce: Duration) -> Self {
        let path = state_path(output_root);
        let signature = PlanSignature::of(plan);

        let state = match load(&path) {
            Some(state) if state.plan_signature == signature && state.mode == mode => {
                tracing::info!(
                    completed = state.completed_chunks(),
                    total = state.totals.chunks,
                    "resuming previous run"
                );
                state
            }
            Some(_) => {
                tracing::info!("run state belongs to another plan, discarding");
                RunState::new(signature, mode, plan)
            }
            None => RunState::new(signature, mode, plan),
        };

        let planned = plan
            .active_items()
            .map(|item| (item.rel_path.clone(), item.chunks.len()))
            .collect();
        let resumed_from = state.completed_chunks();

        Self {
            shared: Arc::new(Shared {
                path,
                debounce,
                inner: Mutex::new(Inner {
                    state,
                    planned,
                    dirty: false,
                    timer_armed: false,
                    finished: false,
                }),
            }),
            resumed_from,
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Chunks already terminal when the state was opened
    pub fn resumed_from(&self) -> usize {
        self.resumed_from
    }

    pub fn snapshot(&self) -> RunState {
        self.shared.lock().state.clone()
    }

    /// Terminal record for a chunk, if it has one
    pub fn completed(&self, rel_path: &str, chunk_id: &str) -> Option<ChunkRunRecord> {
        self.shared
            .lock()
            .state
            .per_file
            .get(rel_path)
            .and_then(|file| file.chunks.get(chunk_id))
            .cloned()
    }

    /// Store a terminal record and schedule a flush.
    pub fn record(&self, rel_path: &str, chunk_id: &str, record: ChunkRunRecord) {
        let mut inner = self.shared.lock();
        if inner.finished {
            return;
        }

        let planned = inner.planned.get(rel_path).copied().unwrap_or(0);
        let now = Utc::now();
        let file = inner.state.per_file.entry(rel_path.to_string()).or_default();
        file.chunks.insert(chunk_id.to_string(), record);
        file.summary = Some(format!("{}/{} chunks done", file.chunks.len(), planned));
        inner.state.recount();
        inner.state.updated_at = now;
        inner.dirty = true;

        if inner.state.completed_chunks() >= inner.state.totals.chunks {
            inner.finished = true;
            inner.dirty = false;
            drop(inner);
            self.remove_file();
            return;
        }

        self.schedule_flush(inner);
    }

    fn remove_file(&self) {
        match fs::remove_file(&self.shared.path) {
            Ok(()) => tracing::debug!("all chunks terminal, run state removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, "failed to remove finished run state"),
        }
    }

    fn schedule_flush(&self, mut inner: MutexGuard<'_, Inner>) {
        if inner.timer_armed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                inner.timer_armed = true;
                drop(inner);
                let shared = Arc::clone(&self.shared);
                handle.spawn(async move {
                    tokio::time::sleep(shared.debounce).await;
                    if let Err(e) = shared.flush() {
                        tracing::warn!(error = %e, "failed to write run state");
                    }
                });
            }
            Err(_) => {
                if let Err(e) = self.shared.write(&mut inner) {
                    tracing::warn!(error = %e, "failed to write run state");
                }
            }
        }
    }

    /// Write pending changes now.
    pub fn flush_now(&self) -> Result<()> {
        self.shared.flush()
    }

    /// Every planned chunk is terminal
    pub fn is_finished(&self) -> bool {
        self.shared.lock().finished
    }
}

impl Drop for RunStateManager {
    fn drop(&mut self) {
        if let Err(e) = self.flush_now() {
            tracing::warn!(error = %e, "failed to write run state on shutdown");
        }
    }
}

impl EventSink for RunStateManager {
    fn on_event(&self, event: &GenerationEvent) {
        if let GenerationEvent::ChunkFinished {
            rel_path,
            chunk_id,
            outcome,
            resumed: false,
            tokens,
            duration_ms,
        } = event
        {
            self.record(
                rel_path,
                chunk_id,
                ChunkRunRecord::from_outcome(outcome, *tokens, *duration_ms),
            );
        }
    }
}
