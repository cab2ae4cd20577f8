// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Runs one generated test file with the project's own test runner

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::project::TestFramework;

/// What to run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub project_root: PathBuf,
    pub test_file: PathBuf,
    pub framework: TestFramework,
}

/// Outcome of one runner invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub ok: bool,
    /// Combined stdout and stderr
    pub output: String,
    /// Command line as it would be typed
    pub command: String,
    /// No runner executable could be found
    pub runner_missing: bool,
}

/// Executes a single test file. Never fails; problems are reported in the output.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run(&self, request: &RunRequest) -> RunReport;
}

/// Spawns the project-local (or global) vitest/jest binary
#[derive(Debug, Clone)]
pub struct ProcessTestRunner {
    timeout: Duration,
    /// Searched after `node_modules/.bin`; `None` means `PATH`
    search_path: Option<Vec<PathBuf>>,
}

impl ProcessTestRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            search_path: None,
        }
    }

    /// Replace `PATH` as the global lookup location
    pub fn with_search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_path = Some(dirs);
        self
    }

    fn binary_name(framework: TestFramework) -> &'static str {
        match framework {
            TestFramework::Vitest => "vitest",
            TestFramework::Jest => "jest",
        }
    }

    fn runner_args(framework: TestFramework, test_file: &Path) -> Vec<String> {
        let file = test_file.to_string_lossy().to_string();
        match framework {
            TestFramework::Vitest => vec!["run".to_string(), file],
            TestFramework::Jest => vec!["--runTestsByPath".to_string(), file, "--ci".to_string()],
        }
    }

    /// Local `node_modules/.bin` first, then the global search path
    pub fn resolve_binary(&self, project_root: &Path, framework: TestFramework) -> Option<PathBuf> {
        let name = Self::binary_name(framework);
        let local = project_root.join("node_modules").join(".bin").join(name);
        if local.is_file() {
            return Some(local);
        }

        let global_dirs: Vec<PathBuf> = match &self.search_path {
            Some(dirs) => dirs.clone(),
            None => std::env::var_os("PATH")
                .map(|p| std::env::split_paths(&p).collect())
                .unwrap_or_default(),
        };
        global_dirs
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

#[async_trait]
impl TestRunner for ProcessTestRunner {
    async fn run(&self, request: &RunRequest) -> RunReport {
        let args = Self::runner_args(request.framework, &request.test_file);
        let name = Self::binary_name(request.framework);

        let Some(binary) = self.resolve_binary(&request.project_root, request.framework) else {
            return RunReport {
                ok: false,
                output: format!(
                    "Test runner '{}' not found in {}/node_modules/.bin or on PATH. Install it or run without --execute.",
                    name,
                    request.project_root.display()
                ),
                command: format!("{} {}", name, args.join(" ")),
                runner_missing: true,
            };
        };
        let command = format!("{} {}", binary.display(), args.join(" "));
        tracing::debug!(%command, "running generated test");

        let child = Command::new(&binary)
            .args(&args)
            .current_dir(&request.project_root)
            .env("CI", "1")
            .env("FORCE_COLOR", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return RunReport {
                    ok: false,
                    output: format!("Failed to spawn test runner: {}", e),
                    command,
                    runner_missing: false,
                }
            }
        };

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                    text.push_str(&stderr);
                }
                RunReport {
                    ok: output.status.success(),
                    output: text,
                    command,
                    runner_missing: false,
                }
            }
            Ok(Err(e)) => RunReport {
                ok: false,
                output: format!("Test runner failed: {}", e),
                command,
                runner_missing: false,
            },
            Err(_) => RunReport {
                ok: false,
                output: format!(
                    "Test run timed out after {} seconds",
                    self.timeout.as_secs()
                ),
                command,
                runner_missing: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(root: &Path, framework: TestFramework) -> RunRequest {
        RunRequest {
            project_root: root.to_path_buf(),
            test_file: root.join("src/__tests__/a.test.ts"),
            framework,
        }
    }

    #[test]
    fn test_runner_args() {
        let file = Path::new("/p/a.test.ts");
        assert_eq!(
            ProcessTestRunner::runner_args(TestFramework::Vitest, file),
            vec!["run", "/p/a.test.ts"]
        );
        assert_eq!(
            ProcessTestRunner::runner_args(TestFramework::Jest, file),
            vec!["--runTestsByPath", "/p/a.test.ts", "--ci"]
        );
    }

    #[tokio::test]
    async fn test_missing_runner_reported_not_thrown() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessTestRunner::new(Duration::from_secs(5)).with_search_path(vec![]);
        let report = runner.run(&request(dir.path(), TestFramework::Jest)).await;

        assert!(!report.ok);
        assert!(report.runner_missing);
        assert!(report.output.contains("'jest' not found"));
    }

    #[cfg(unix)]
    fn fake_runner(root: &Path, name: &str, script: &str) {
        use std::os::unix::fs::PermissionsExt;
        let bin = root.join("node_modules/.bin");
        std::fs::create_dir_all(&bin).unwrap();
        let path = bin.join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_runner_passes() {
        let dir = TempDir::new().unwrap();
        fake_runner(dir.path(), "vitest", "#!/bin/sh\necho \"ran $1 CI=$CI\"\nexit 0\n");
        let runner = ProcessTestRunner::new(Duration::from_secs(10)).with_search_path(vec![]);
        let report = runner.run(&request(dir.path(), TestFramework::Vitest)).await;

        assert!(report.ok, "{}", report.output);
        assert!(!report.runner_missing);
        assert!(report.output.contains("ran run CI=1"));
        assert!(report.command.contains("node_modules/.bin/vitest run"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_run_captures_stderr() {
        let dir = TempDir::new().unwrap();
        fake_runner(
            dir.path(),
            "jest",
            "#!/bin/sh\necho 'FAIL a.test.ts'\necho 'Expected 3, received 4' >&2\nexit 1\n",
        );
        let runner = ProcessTestRunner::new(Duration::from_secs(10)).with_search_path(vec![]);
        let report = runner.run(&request(dir.path(), TestFramework::Jest)).await;

        assert!(!report.ok);
        assert!(report.output.contains("FAIL a.test.ts"));
        assert!(report.output.contains("Expected 3, received 4"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_global_runner_fallback() {
        let dir = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        fake_runner(global.path(), "vitest", "#!/bin/sh\nexit 0\n");
        let runner = ProcessTestRunner::new(Duration::from_secs(10))
            .with_search_path(vec![global.path().join("node_modules/.bin")]);

        let resolved = runner.resolve_binary(dir.path(), TestFramework::Vitest).unwrap();
        assert!(resolved.starts_with(global.path()));
    }
}
