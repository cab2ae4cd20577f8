// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Test framework and UI renderer detection from `package.json`

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Test framework the generated files target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    Vitest,
    Jest,
}

/// UI rendering library available to component tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiRenderer {
    None,
    ReactTestingLibrary,
}

/// Detected test setup of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSetup {
    pub framework: TestFramework,
    pub renderer: UiRenderer,
}

impl Default for TestSetup {
    fn default() -> Self {
        Self {
            framework: TestFramework::Vitest,
            renderer: UiRenderer::None,
        }
    }
}

impl TestFramework {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestFramework::Vitest => "vitest",
            TestFramework::Jest => "jest",
        }
    }
}

impl UiRenderer {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiRenderer::None => "none",
            UiRenderer::ReactTestingLibrary => "react-testing-library",
        }
    }
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UiRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn has_dependency(manifest: &serde_json::Value, name: &str) -> bool {
    ["dependencies", "devDependencies", "peerDependencies"]
        .iter()
        .any(|section| manifest[section].get(name).is_some())
}

/// Read `package.json` under `root` and pick framework and renderer.
///
/// `vitest` wins over `jest`; with neither present the test script is
/// consulted, then `vitest` is assumed. A missing or unparseable manifest
/// yields the default setup.
pub fn detect_test_setup(root: &Path) -> TestSetup {
    let path = root.join("package.json");
    let manifest: serde_json::Value = match std::fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "package.json is not valid JSON");
                return TestSetup::default();
            }
        },
        Err(_) => return TestSetup::default(),
    };

    let test_script = manifest["scripts"]["test"].as_str().unwrap_or("");

    let framework = if has_dependency(&manifest, "vitest") {
        TestFramework::Vitest
    } else if has_dependency(&manifest, "jest") || test_script.contains("jest") {
        TestFramework::Jest
    } else {
        TestFramework::Vitest
    };

    let renderer = if has_dependency(&manifest, "@testing-library/react")
        || has_dependency(&manifest, "react")
    {
        UiRenderer::ReactTestingLibrary
    } else {
        UiRenderer::None
    };

    TestSetup {
        framework,
        renderer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(manifest: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), manifest).unwrap();
        temp
    }

    #[test]
    fn test_detect_missing_manifest_defaults() {
        let temp = TempDir::new().unwrap();
        assert_eq!(detect_test_setup(temp.path()), TestSetup::default());
    }

    #[test]
    fn test_detect_vitest_preferred_over_jest() {
        let temp = project(r#"{"devDependencies": {"jest": "29", "vitest": "1"}}"#);
        assert_eq!(detect_test_setup(temp.path()).framework, TestFramework::Vitest);
    }

    #[test]
    fn test_detect_jest() {
        let temp = project(r#"{"devDependencies": {"jest": "29"}}"#);
        assert_eq!(detect_test_setup(temp.path()).framework, TestFramework::Jest);
    }

    #[test]
    fn test_detect_jest_from_script() {
        let temp = project(r#"{"scripts": {"test": "jest --coverage"}}"#);
        assert_eq!(detect_test_setup(temp.path()).framework, TestFramework::Jest);
    }

    #[test]
    fn test_detect_react_renderer() {
        let temp = project(r#"{"dependencies": {"react": "18"}}"#);
        let setup = detect_test_setup(temp.path());
        assert_eq!(setup.renderer, UiRenderer::ReactTestingLibrary);
        assert_eq!(setup.framework, TestFramework::Vitest);
    }

    #[test]
    fn test_detect_invalid_manifest_defaults() {
        let temp = project("{ nope");
        assert_eq!(detect_test_setup(temp.path()), TestSetup::default());
    }

    #[test]
    fn test_display() {
        assert_eq!(TestFramework::Jest.to_string(), "jest");
        assert_eq!(
            UiRenderer::ReactTestingLibrary.to_string(),
            "react-testing-library"
        );
    }
}
