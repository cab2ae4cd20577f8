// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Deterministic fingerprint of a work plan, used to validate resumed runs

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::budget::WorkPlan;

/// Hex-encoded SHA-256 over the parts of a plan that affect generation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanSignature(String);

impl PlanSignature {
    /// Fingerprint `plan`. Item order does not matter.
    pub fn of(plan: &WorkPlan) -> Self {
        let mut items: Vec<&_> = plan.items.iter().collect();
        items.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        let mut hasher = Sha256::new();
        hasher.update(plan.test_framework.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(plan.ui_renderer.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(plan.context_budget.to_le_bytes());

        for item in items {
            hasher.update([1]);
            hasher.update(item.rel_path.as_bytes());
            hasher.update([0]);
            hasher.update(item.original_token_count.to_le_bytes());

            let mut chunks: Vec<&_> = item.chunks.iter().collect();
            chunks.sort_by(|a, b| a.id.cmp(&b.id));
            for chunk in chunks {
                hasher.update([2]);
                hasher.update(chunk.id.as_bytes());
                hasher.update([0]);
                hasher.update(chunk.kind.as_str().as_bytes());
                hasher.update(chunk.approx_tokens.to_le_bytes());
            }
        }

        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlanSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
