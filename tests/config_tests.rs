// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use tempfile::TempDir;
use testforge::config::{Settings, SettingsOverrides};

#[test]
fn test_settings_default_values() {
    let settings = Settings::default();

    assert_eq!(settings.backend.provider, "ollama");
    assert_eq!(settings.generation.max_attempts, 3);
    assert_eq!(settings.generation.concurrency, 1);
    assert_eq!(settings.generation.skip_sentinel, "// SKIP");
    assert_eq!(settings.generation.test_dir, "__tests__");
    assert!(!settings.generation.force);
    assert!(!settings.agent.enabled);
    assert_eq!(settings.agent.max_tool_calls, 8);
}

#[test]
fn test_testforge_home_override_drives_default_path() {
    // The only test in this binary touching TESTFORGE_HOME
    let temp = TempDir::new().unwrap();
    std::env::set_var("TESTFORGE_HOME", temp.path());

    assert_eq!(Settings::testforge_home(), temp.path());
    assert_eq!(Settings::default_path(), temp.path().join("settings.json"));

    let mut settings = Settings::load().unwrap();
    assert_eq!(settings.generation.max_attempts, 3);

    settings.generation.max_attempts = 5;
    settings.backend.provider = "openai".to_string();
    settings.save().unwrap();
    assert!(temp.path().join("settings.json").exists());

    let reloaded = Settings::load().unwrap();
    assert_eq!(reloaded.generation.max_attempts, 5);
    assert_eq!(reloaded.backend.provider, "openai");

    std::env::remove_var("TESTFORGE_HOME");
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.json");
    std::fs::write(&path, r#"{"generation": {"concurrency": 4}}"#).unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.generation.concurrency, 4);
    assert_eq!(settings.generation.max_attempts, 3);
    assert_eq!(settings.planning.fallback_context_window, 8192);
}

#[test]
fn test_overrides_then_validate() {
    let mut settings = Settings::default();
    settings.apply_overrides(&SettingsOverrides {
        provider: Some("openai".to_string()),
        concurrency: Some(0),
        ..Default::default()
    });

    assert_eq!(settings.backend.resolved_base_url(), "https://api.openai.com/v1");
    assert!(settings.validate().is_err());

    settings.generation.concurrency = 2;
    assert!(settings.validate().is_ok());
}
