// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Work planning: token budgets, chunking and plan signatures

pub mod budget;
pub mod chunker;
pub mod signature;

pub use budget::{plan, BudgetPolicy, SkipReason, WorkItem, WorkPlan};
pub use chunker::{chunk, Chunk, ChunkKind};
pub use signature::PlanSignature;
