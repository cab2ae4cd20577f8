// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! testforge - verified unit-test generation
//!
//! Entry point for the testforge CLI application.

use std::sync::{Arc, OnceLock};

use clap::Parser;

use testforge::cli::{self, Cli, StateSlot};
use testforge::config::Settings;

/// Exit code after an interrupt, as shells report SIGINT
const EXIT_INTERRUPTED: i32 = 130;

fn init_tracing(cli: &Cli) {
    // RUST_LOG wins over -v
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let settings = Settings::load()?;
    let slot: StateSlot = Arc::new(OnceLock::new());

    let outcome = tokio::select! {
        outcome = cli::run(&cli, settings, slot.clone()) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            if let Some(state) = slot.get() {
                if let Err(e) = state.flush_now() {
                    eprintln!("Failed to save progress: {}", e);
                } else {
                    eprintln!("\nInterrupted. Progress saved to {}", state.path().display());
                }
            } else {
                eprintln!("\nInterrupted.");
            }
            std::process::exit(EXIT_INTERRUPTED);
        }
    };

    std::process::exit(outcome.exit_code());
}
