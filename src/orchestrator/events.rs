// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Generation events and their observers
//!
//! The orchestrator emits one immutable [`GenerationEvent`] per state
//! transition. Persistence, logging and terminal display are all
//! [`EventSink`]s; none of them is known to the orchestrator.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use super::summary::RunSummary;
use crate::planner::SkipReason;

/// Terminal outcome of one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChunkOutcome {
    /// Accepted and on disk
    Written {
        path: PathBuf,
        attempts: u32,
        test_cases: usize,
    },
    /// Destination already present and overwriting is off
    Exists { path: PathBuf },
    /// Nothing to test, per the backend
    Skipped { reason: String },
    /// Abandoned after the attempt budget, or the backend failed
    Failed { reason: String, attempts: u32 },
}

impl ChunkOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ChunkOutcome::Written { .. } => "write",
            ChunkOutcome::Exists { .. } => "exists",
            ChunkOutcome::Skipped { .. } => "skip",
            ChunkOutcome::Failed { .. } => "error",
        }
    }

    /// Short deterministic reason shown to the user
    pub fn reason(&self) -> String {
        match self {
            ChunkOutcome::Written {
                path,
                attempts,
                test_cases,
            } => format!(
                "{} ({} test{}, attempt {})",
                path.display(),
                test_cases,
                if *test_cases == 1 { "" } else { "s" },
                attempts
            ),
            ChunkOutcome::Exists { path } => format!("{} already exists", path.display()),
            ChunkOutcome::Skipped { reason } | ChunkOutcome::Failed { reason, .. } => {
                reason.clone()
            }
        }
    }
}

/// One state transition of a run
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    PlanReady {
        signature: String,
        files: usize,
        chunks: usize,
        skipped_files: usize,
    },
    FileSkipped {
        rel_path: String,
        reason: SkipReason,
    },
    ChunkStarted {
        rel_path: String,
        chunk_id: String,
        label: String,
    },
    PlanningFinished {
        rel_path: String,
        chunk_id: String,
        cases: usize,
        tool_calls: usize,
    },
    PlanningFailed {
        rel_path: String,
        chunk_id: String,
        reason: String,
    },
    AttemptStarted {
        rel_path: String,
        chunk_id: String,
        attempt: u32,
    },
    AttemptFailed {
        rel_path: String,
        chunk_id: String,
        attempt: u32,
        reason: String,
    },
    ChunkFinished {
        rel_path: String,
        chunk_id: String,
        outcome: ChunkOutcome,
        /// Completed in an earlier, interrupted run
        resumed: bool,
        tokens: Option<u32>,
        duration_ms: Option<u64>,
    },
    RunFinished {
        summary: RunSummary,
    },
}

/// Observer of generation events. Must not block.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &GenerationEvent);
}

/// Fan-out over several sinks
#[derive(Default, Clone)]
pub struct EventBus {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn emit(&self, event: GenerationEvent) {
        for sink in &self.sinks {
            sink.on_event(&event);
        }
    }
}

/// Writes every event as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &GenerationEvent) {
        match event {
            GenerationEvent::PlanReady {
                signature,
                files,
                chunks,
                skipped_files,
            } => tracing::info!(%signature, files, chunks, skipped_files, "plan ready"),
            GenerationEvent::FileSkipped { rel_path, reason } => {
                tracing::info!(file = %rel_path, reason = %reason, "file skipped")
            }
            GenerationEvent::ChunkStarted {
                rel_path,
                chunk_id,
                label,
            } => tracing::debug!(file = %rel_path, chunk = %chunk_id, %label, "chunk started"),
            GenerationEvent::PlanningFinished {
                rel_path,
                chunk_id,
                cases,
                tool_calls,
            } => tracing::debug!(file = %rel_path, chunk = %chunk_id, cases, tool_calls, "test plan ready"),
            GenerationEvent::PlanningFailed {
                rel_path,
                chunk_id,
                reason,
            } => tracing::warn!(file = %rel_path, chunk = %chunk_id, %reason, "planning failed, generating without a plan"),
            GenerationEvent::AttemptStarted {
                rel_path,
                chunk_id,
                attempt,
            } => tracing::debug!(file = %rel_path, chunk = %chunk_id, attempt, "attempt started"),
            GenerationEvent::AttemptFailed {
                rel_path,
                chunk_id,
                attempt,
                reason,
            } => tracing::debug!(file = %rel_path, chunk = %chunk_id, attempt, %reason, "attempt failed"),
            GenerationEvent::ChunkFinished {
                rel_path,
                chunk_id,
                outcome,
                resumed,
                tokens,
                duration_ms,
            } => tracing::info!(
                file = %rel_path,
                chunk = %chunk_id,
                status = outcome.label(),
                reason = %outcome.reason(),
                resumed,
                tokens = tokens.unwrap_or(0),
                duration_ms = duration_ms.unwrap_or(0),
                "chunk finished"
            ),
            GenerationEvent::RunFinished { summary } => tracing::info!(
                written = summary.written,
                exists = summary.exists,
                skipped = summary.skipped,
                failed = summary.failed,
                resumed = summary.resumed,
                "run finished"
            ),
        }
    }
}

/// Forwards events to a channel, typically drained by the terminal display
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<GenerationEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GenerationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event: &GenerationEvent) {
        // Receiver gone means nobody is watching
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every event for assertions
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<GenerationEvent>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<GenerationEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn on_event(&self, event: &GenerationEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingSink;
    use super::*;

    fn started() -> GenerationEvent {
        GenerationEvent::ChunkStarted {
            rel_path: "src/a.ts".to_string(),
            chunk_id: "src/a.ts#module".to_string(),
            label: "module".to_string(),
        }
    }

    #[test]
    fn test_bus_fans_out() {
        let first = Arc::new(RecordingSink::default());
        let second = Arc::new(RecordingSink::default());
        let mut bus = EventBus::new();
        bus.subscribe(first.clone());
        bus.subscribe(second.clone());
        bus.subscribe(Arc::new(TracingSink));
        assert_eq!(bus.len(), 3);

        bus.emit(started());
        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 1);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.on_event(&started());
        match rx.recv().await {
            Some(GenerationEvent::ChunkStarted { label, .. }) => assert_eq!(label, "module"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_event(&started());
    }

    #[test]
    fn test_outcome_reason() {
        let written = ChunkOutcome::Written {
            path: PathBuf::from("src/__tests__/a.test.ts"),
            attempts: 2,
            test_cases: 1,
        };
        assert_eq!(written.label(), "write");
        assert_eq!(written.reason(), "src/__tests__/a.test.ts (1 test, attempt 2)");

        let skipped = ChunkOutcome::Skipped {
            reason: "Model returned no code".to_string(),
        };
        assert_eq!(skipped.reason(), "Model returned no code");
    }
}
