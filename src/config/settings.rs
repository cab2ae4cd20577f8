// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for testforge
//!
//! Handles loading and saving settings from ~/.testforge/settings.json

use serde::{Deserialize, Serialize};

mod io;
mod validation;

pub use validation::SettingsOverrides;

/// Main settings structure, stored in ~/.testforge/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Generative backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Per-chunk generation loop settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Budget planning settings
    #[serde(default)]
    pub planning: PlanningConfig,

    /// Tool-calling planning agent settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Run-state persistence settings
    #[serde(default)]
    pub state: StateConfig,

    /// Retry and resilience settings for backend calls
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

/// Generative backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Provider name: "ollama" or "openai"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL override (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Generation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum attempts per chunk (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Token ceiling for each generation
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Number of chunks processed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Line the model emits when there is nothing to test; also sent as a stop sequence
    #[serde(default = "default_skip_sentinel")]
    pub skip_sentinel: String,

    /// Sub-directory next to the source file that receives tests
    #[serde(default = "default_test_dir")]
    pub test_dir: String,

    /// Overwrite existing test files
    #[serde(default)]
    pub force: bool,

    /// Run each candidate with the project's test runner
    #[serde(default)]
    pub execute: bool,

    /// Timeout for one test runner invocation, in seconds
    #[serde(default = "default_runner_timeout_secs")]
    pub runner_timeout_secs: u64,
}

/// Budget planning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// Share of the context window usable for one prompt
    #[serde(default = "default_context_fraction")]
    pub context_fraction: f64,

    /// Usable budget never drops below this many tokens
    #[serde(default = "default_budget_floor")]
    pub budget_floor: u32,

    /// Tokens reserved for prompt scaffolding around the code
    #[serde(default = "default_prompt_overhead")]
    pub prompt_overhead: u32,

    /// Files smaller than this are skipped
    #[serde(default = "default_min_file_tokens")]
    pub min_file_tokens: u32,

    /// Context window assumed when the backend cannot be probed
    #[serde(default = "default_fallback_context_window")]
    pub fallback_context_window: u32,

    /// Explicit context window, skipping the probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_size: Option<u32>,
}

/// Planning agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Run the planning agent before generation
    #[serde(default)]
    pub enabled: bool,

    /// Tool calls allowed per chunk
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,
}

/// Run-state persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Coalescing window for state file writes
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

/// Retry and resilience configuration for backend calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (cap for backoff)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter percentage (0.0 to 1.0) for randomizing delays
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            concurrency: default_concurrency(),
            skip_sentinel: default_skip_sentinel(),
            test_dir: default_test_dir(),
            force: false,
            execute: false,
            runner_timeout_secs: default_runner_timeout_secs(),
        }
    }
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            context_fraction: default_context_fraction(),
            budget_floor: default_budget_floor(),
            prompt_overhead: default_prompt_overhead(),
            min_file_tokens: default_min_file_tokens(),
            fallback_context_window: default_fallback_context_window(),
            context_size: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_tool_calls: default_max_tool_calls(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_concurrency() -> usize {
    1
}

fn default_skip_sentinel() -> String {
    "// SKIP".to_string()
}

fn default_test_dir() -> String {
    "__tests__".to_string()
}

fn default_runner_timeout_secs() -> u64 {
    120
}

fn default_context_fraction() -> f64 {
    0.5
}

fn default_budget_floor() -> u32 {
    2048
}

fn default_prompt_overhead() -> u32 {
    600
}

fn default_min_file_tokens() -> u32 {
    12
}

fn default_fallback_context_window() -> u32 {
    8192
}

fn default_max_tool_calls() -> u32 {
    8
}

fn default_debounce_ms() -> u64 {
    400
}

// Resilience config defaults
fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    16000
}

fn default_jitter() -> f64 {
    0.25
}
