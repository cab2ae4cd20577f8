// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! testforge - budgeted, verified unit-test generation for TypeScript and
//! JavaScript projects.
//!
//! A run scans the project, plans token-bounded chunks, and drives a
//! generative backend through prompt → generate → extract → verify →
//! (execute) with retries, persisting progress so an interrupted run resumes.
//!
//! - `planner`: chunking, budgets and the plan signature
//! - `prompt`, `verify`, `runner`: one attempt's building blocks
//! - `agent`, `tools`: optional read-only planning loop before generation
//! - `orchestrator`: the per-chunk state machine and the event stream
//! - `state`: crash-resumable run state
//! - `llm`: backend abstraction (Ollama, OpenAI-compatible, mock)

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod planner;
pub mod project;
pub mod prompt;
pub mod runner;
pub mod state;
pub mod syntax;
pub mod tools;
pub mod utils;
pub mod verify;

pub use error::{ForgeError, Result};
