// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Terminal progress fed by the event channel

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::orchestrator::{ChunkOutcome, GenerationEvent, RunSummary};

/// Progress bar over planned chunks, hidden when stderr is not a terminal
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    pub fn new(total_chunks: usize, enabled: bool) -> Self {
        let bar = (enabled && is_interactive()).then(|| {
            let bar = ProgressBar::new(total_chunks as u64);
            let style = ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        });
        Self { bar }
    }

    pub fn handle(&self, event: &GenerationEvent) {
        let Some(bar) = &self.bar else {
            return;
        };
        match event {
            GenerationEvent::ChunkStarted { rel_path, label, .. } => {
                bar.set_message(format!("{} :: {}", rel_path, label))
            }
            GenerationEvent::AttemptStarted {
                rel_path, attempt, ..
            } if *attempt > 1 => bar.set_message(format!("{} (attempt {})", rel_path, attempt)),
            GenerationEvent::ChunkFinished {
                rel_path, outcome, ..
            } => {
                bar.inc(1);
                if let ChunkOutcome::Failed { reason, .. } = outcome {
                    bar.println(format!("  error {}: {}", rel_path, reason));
                }
            }
            GenerationEvent::RunFinished { .. } => bar.finish_and_clear(),
            _ => {}
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

fn is_interactive() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Drain `rx` into a progress bar until the sender side is gone.
pub fn spawn_display(
    mut rx: mpsc::UnboundedReceiver<GenerationEvent>,
    total_chunks: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let progress = Progress::new(total_chunks, true);
        while let Some(event) = rx.recv().await {
            progress.handle(&event);
        }
    })
}

/// Final per-file report printed after a run
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    for (rel_path, lines) in &summary.files {
        for line in lines {
            let label = match &line.chunk_id {
                Some(id) => id.rsplit_once('#').map(|(_, l)| l).unwrap_or(id.as_str()),
                None => "-",
            };
            out.push_str(&format!(
                "{:<7} {} [{}] {}{}\n",
                line.status,
                rel_path,
                label,
                line.reason,
                if line.resumed { " (resumed)" } else { "" }
            ));
        }
    }
    out.push_str(&format!(
        "\n{} written, {} existing, {} skipped, {} failed",
        summary.written, summary.exists, summary.skipped, summary.failed
    ));
    if summary.resumed > 0 {
        out.push_str(&format!(" ({} resumed)", summary.resumed));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::SkipReason;

    #[test]
    fn test_progress_disabled() {
        let progress = Progress::new(3, false);
        assert!(progress.bar.is_none());
        progress.handle(&GenerationEvent::RunFinished {
            summary: RunSummary::default(),
        });
    }

    #[test]
    fn test_render_summary() {
        let mut summary = RunSummary::default();
        summary.record_file_skip("src/types.ts", SkipReason::TypesOnly);
        summary.record_chunk(
            "src/math.ts",
            "src/math.ts#module",
            &ChunkOutcome::Skipped {
                reason: "Model returned no code".to_string(),
            },
            true,
        );

        let text = render_summary(&summary);
        assert!(text.contains("skip    src/math.ts [module] Model returned no code (resumed)"));
        assert!(text.contains("skip    src/types.ts [-] Types-only file"));
        assert!(text.contains("0 written, 0 existing, 2 skipped, 0 failed (1 resumed)"));
    }
}
