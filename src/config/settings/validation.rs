// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{ForgeError, Result};
use crate::llm::providers::ollama::DEFAULT_OLLAMA_URL;
use crate::llm::providers::openai::DEFAULT_OPENAI_URL;

use super::{BackendConfig, Settings};

/// Values given on the command line; `None` leaves the file value alone.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub context_size: Option<u32>,
    pub max_attempts: Option<u32>,
    pub concurrency: Option<usize>,
    pub max_tool_calls: Option<u32>,
    pub force: bool,
    pub execute: bool,
    pub agent: bool,
}

impl BackendConfig {
    /// Get the API key, checking the configured env var first.
    pub fn api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
    }

    /// Base URL with the provider's default filled in.
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None if self.provider == "openai" => DEFAULT_OPENAI_URL.to_string(),
            None => DEFAULT_OLLAMA_URL.to_string(),
        }
    }
}

impl Settings {
    /// Layer command-line values over the loaded file.
    pub fn apply_overrides(&mut self, overrides: &SettingsOverrides) {
        if let Some(provider) = &overrides.provider {
            self.backend.provider = provider.clone();
        }
        if let Some(base_url) = &overrides.base_url {
            self.backend.base_url = Some(base_url.clone());
        }
        if let Some(context_size) = overrides.context_size {
            self.planning.context_size = Some(context_size);
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.generation.max_attempts = max_attempts;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.generation.concurrency = concurrency;
        }
        if let Some(max_tool_calls) = overrides.max_tool_calls {
            self.agent.max_tool_calls = max_tool_calls;
        }
        // Flags only switch features on
        self.generation.force |= overrides.force;
        self.generation.execute |= overrides.execute;
        self.agent.enabled |= overrides.agent;
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.generation.max_attempts == 0 {
            return Err(ForgeError::Config(
                "generation.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.generation.concurrency == 0 {
            return Err(ForgeError::Config(
                "generation.concurrency must be at least 1".to_string(),
            ));
        }
        let fraction = self.planning.context_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ForgeError::Config(format!(
                "planning.context_fraction must be in (0, 1], got {}",
                fraction
            )));
        }
        if self.generation.skip_sentinel.trim().is_empty() {
            return Err(ForgeError::Config(
                "generation.skip_sentinel must not be empty".to_string(),
            ));
        }
        if self.generation.test_dir.trim().is_empty() {
            return Err(ForgeError::Config(
                "generation.test_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
