// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::Parser;
use std::path::PathBuf;

use crate::config::SettingsOverrides;

/// testforge - generate verified unit tests with a language model
#[derive(Parser, Debug, Clone)]
#[command(name = "testforge")]
#[command(version, about = "Generate verified unit tests for TypeScript and JavaScript projects")]
pub struct Cli {
    /// Model to generate with (e.g. "qwen2.5-coder:7b", "gpt-4o-mini")
    pub model: String,

    /// Project directory (defaults to current)
    pub project: Option<PathBuf>,

    /// Root that test files are written under (defaults to the project)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Only consider files matching this glob (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Skip files matching this glob (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Overwrite existing test files
    #[arg(short, long)]
    pub force: bool,

    /// Print the plan without generating anything
    #[arg(long)]
    pub dry_run: bool,

    /// Context window of the model in tokens (skips probing)
    #[arg(long, value_name = "TOKENS")]
    pub context_size: Option<u32>,

    /// Let the model inspect the project before writing tests
    #[arg(long)]
    pub agent: bool,

    /// Tool calls allowed per chunk in agent mode
    #[arg(long, value_name = "N")]
    pub max_tool_calls: Option<u32>,

    /// Attempts per chunk, first try included
    #[arg(long = "max-fix-loops", value_name = "N")]
    pub max_fix_loops: Option<u32>,

    /// Run each accepted candidate with the project's test runner
    #[arg(long)]
    pub execute: bool,

    /// Chunks generated at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Backend provider (ollama, openai)
    #[arg(long)]
    pub provider: Option<String>,

    /// Backend base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Forget progress of an interrupted run
    #[arg(long)]
    pub reset: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            provider: self.provider.clone(),
            base_url: self.base_url.clone(),
            context_size: self.context_size,
            max_attempts: self.max_fix_loops,
            concurrency: self.concurrency,
            max_tool_calls: self.max_tool_calls,
            force: self.force,
            execute: self.execute,
            agent: self.agent,
        }
    }

    /// Log filter directive for the `-v` count
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
