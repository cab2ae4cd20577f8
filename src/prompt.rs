// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt assembly for test generation
//!
//! A prompt carries the output constraints, the skip sentinel, the file path,
//! the code under test and, on retries, the previous candidate together with
//! a bounded failure summary. [`fit_prompt`] degrades the code until the
//! whole prompt fits the token budget.

use crate::agent::TestPlan;
use crate::planner::ChunkKind;
use crate::project::{TestFramework, UiRenderer};
use crate::syntax::{self, Dialect};
use crate::utils::{estimate_tokens, tokens_to_chars, truncate_end, truncate_middle};

/// Failure feedback is cut to this many characters, head and tail kept
pub const FEEDBACK_MAX_CHARS: usize = 1800;

/// Previous candidate is cut to this many characters
pub const PREVIOUS_CANDIDATE_MAX_CHARS: usize = 4000;

/// System instruction sent with every generation request
pub const SYSTEM_PROMPT: &str = "You write focused, deterministic unit tests for TypeScript and JavaScript code. \
Reply with exactly one fenced code block containing a complete test file and nothing else.";

/// Everything a generation prompt is built from
#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    pub framework: TestFramework,
    pub renderer: UiRenderer,
    pub rel_path: &'a str,
    pub kind: ChunkKind,
    /// Declaration name or `module`
    pub label: &'a str,
    pub code: &'a str,
    /// Specifier the test should import the code under test from
    pub import_specifier: Option<&'a str>,
    pub skip_sentinel: &'a str,
    /// 1-based
    pub attempt: u32,
    pub previous_candidate: Option<&'a str>,
    pub failure_feedback: Option<&'a str>,
    pub plan: Option<&'a TestPlan>,
}

fn framework_rules(framework: TestFramework) -> &'static str {
    match framework {
        TestFramework::Vitest => {
            "- Use Vitest. Import what you use: `import { describe, it, expect, vi } from 'vitest';`\n\
             - Mock modules with `vi.mock` and functions with `vi.fn()`.\n"
        }
        TestFramework::Jest => {
            "- Use Jest. `describe`, `it`, `expect` and `jest` are globals; do not import them.\n\
             - Mock modules with `jest.mock` and functions with `jest.fn()`.\n"
        }
    }
}

fn renderer_rules(renderer: UiRenderer, kind: ChunkKind) -> &'static str {
    match (renderer, kind) {
        (UiRenderer::ReactTestingLibrary, ChunkKind::Component) => {
            "- Render with `render` and query with `screen` from '@testing-library/react'. Assert on visible output, not implementation details.\n"
        }
        (UiRenderer::ReactTestingLibrary, ChunkKind::Hook) => {
            "- Exercise the hook with `renderHook` and `act` from '@testing-library/react'.\n"
        }
        (UiRenderer::ReactTestingLibrary, _) => {
            "- '@testing-library/react' is available for anything that renders.\n"
        }
        (UiRenderer::None, _) => "",
    }
}

/// Build the generation prompt.
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Write unit tests for the {} `{}` from `{}`.\n\n",
        input.kind, input.label, input.rel_path
    ));

    prompt.push_str("## Constraints\n");
    prompt.push_str("- Output exactly one fenced code block holding the whole test file.\n");
    prompt.push_str("- Every test must be an `it(...)` or `test(...)` call inside `describe`.\n");
    prompt.push_str(framework_rules(input.framework));
    prompt.push_str(renderer_rules(input.renderer, input.kind));
    if let Some(specifier) = input.import_specifier {
        prompt.push_str(&format!(
            "- Import the code under test from '{}'.\n",
            specifier
        ));
    }
    prompt.push_str("- Do not use network access, timers without fakes, or snapshot files.\n");
    prompt.push_str(&format!(
        "- If nothing here can be meaningfully tested, reply with only `{}`.\n\n",
        input.skip_sentinel
    ));

    if let Some(plan) = input.plan.filter(|p| !p.is_empty()) {
        prompt.push_str("## Planned test cases\n");
        prompt.push_str(&plan.render());
        prompt.push('\n');
    }

    prompt.push_str(&format!("## Code under test ({})\n", input.rel_path));
    prompt.push_str("```\n");
    prompt.push_str(input.code);
    if !input.code.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("```\n");

    if input.attempt > 1 {
        if let Some(previous) = input.previous_candidate {
            prompt.push_str(&format!(
                "\n## Previous attempt ({} of the loop)\n```\n{}\n```\n",
                input.attempt - 1,
                truncate_end(previous.trim_end(), PREVIOUS_CANDIDATE_MAX_CHARS)
            ));
        }
        if let Some(feedback) = input.failure_feedback {
            prompt.push_str(&format!(
                "\n## Why it failed\n{}\n\nFix these problems and return the corrected test file.\n",
                truncate_middle(feedback.trim(), FEEDBACK_MAX_CHARS)
            ));
        }
    }

    prompt
}

/// Build a prompt that fits `budget_tokens`, degrading the code if needed.
///
/// Comments are stripped first, then whitespace is collapsed, then the code
/// is cut hard. Returns the prompt and whether the code was degraded.
pub fn fit_prompt(input: &PromptInput<'_>, budget_tokens: u32) -> (String, bool) {
    let prompt = build_prompt(input);
    if estimate_tokens(&prompt) <= budget_tokens {
        return (prompt, false);
    }

    let dialect = Dialect::for_path(input.rel_path);
    let stripped = syntax::strip_comments(input.code, dialect);
    let prompt = build_prompt(&PromptInput {
        code: &stripped,
        ..input.clone()
    });
    if estimate_tokens(&prompt) <= budget_tokens {
        return (prompt, true);
    }

    let collapsed = syntax::collapse_whitespace(&stripped);
    let prompt = build_prompt(&PromptInput {
        code: &collapsed,
        ..input.clone()
    });
    if estimate_tokens(&prompt) <= budget_tokens {
        return (prompt, true);
    }

    let scaffolding = prompt.chars().count() - collapsed.chars().count();
    let room = tokens_to_chars(budget_tokens).saturating_sub(scaffolding);
    let truncated = truncate_end(&collapsed, room);
    tracing::debug!(
        path = input.rel_path,
        budget_tokens,
        kept_chars = room,
        "hard-truncating code to fit prompt budget"
    );
    let prompt = build_prompt(&PromptInput {
        code: &truncated,
        ..input.clone()
    });
    (prompt, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TestCase;

    fn input<'a>(code: &'a str) -> PromptInput<'a> {
        PromptInput {
            framework: TestFramework::Vitest,
            renderer: UiRenderer::None,
            rel_path: "src/math.ts",
            kind: ChunkKind::Module,
            label: "module",
            code,
            import_specifier: Some("../math"),
            skip_sentinel: "// SKIP",
            attempt: 1,
            previous_candidate: None,
            failure_feedback: None,
            plan: None,
        }
    }

    #[test]
    fn test_first_attempt_contents() {
        let prompt = build_prompt(&input("export const add = (a, b) => a + b;"));
        assert!(prompt.contains("src/math.ts"));
        assert!(prompt.contains("export const add"));
        assert!(prompt.contains("`// SKIP`"));
        assert!(prompt.contains("from 'vitest'"));
        assert!(prompt.contains("'../math'"));
        assert!(!prompt.contains("Why it failed"));
    }

    #[test]
    fn test_retry_includes_candidate_and_feedback() {
        let prompt = build_prompt(&PromptInput {
            attempt: 2,
            previous_candidate: Some("it('x', () => { expect(add(1,2)).toBe(3) })"),
            failure_feedback: Some("TS2304 line 1: Cannot find name 'add'"),
            ..input("export const add = (a, b) => a + b;")
        });
        assert!(prompt.contains("Previous attempt"));
        assert!(prompt.contains("expect(add(1,2))"));
        assert!(prompt.contains("Cannot find name 'add'"));
    }

    #[test]
    fn test_retry_feedback_is_bounded() {
        let feedback = format!("FIRST\n{}\nLAST", "noise ".repeat(2000));
        let prompt = build_prompt(&PromptInput {
            attempt: 3,
            failure_feedback: Some(&feedback),
            ..input("x")
        });
        assert!(prompt.contains("FIRST"));
        assert!(prompt.contains("LAST"));
        assert!(prompt.contains("[truncated]"));
        assert!(prompt.len() < feedback.len());
    }

    #[test]
    fn test_jest_and_component_rules() {
        let prompt = build_prompt(&PromptInput {
            framework: TestFramework::Jest,
            renderer: UiRenderer::ReactTestingLibrary,
            kind: ChunkKind::Component,
            label: "Button",
            ..input("export function Button() { return <button />; }")
        });
        assert!(prompt.contains("jest.fn()"));
        assert!(prompt.contains("screen"));
        assert!(prompt.contains("component `Button`"));
    }

    #[test]
    fn test_plan_is_rendered() {
        let plan = TestPlan {
            cases: vec![TestCase {
                title: "adds".to_string(),
                arrange: String::new(),
                act: String::new(),
                assert: String::new(),
                mocks: vec![],
            }],
        };
        let prompt = build_prompt(&PromptInput {
            plan: Some(&plan),
            ..input("x")
        });
        assert!(prompt.contains("## Planned test cases\n1. adds"));
    }

    #[test]
    fn test_fit_prompt_leaves_small_prompts_alone() {
        let (prompt, degraded) = fit_prompt(&input("export const a = 1; // one"), 10_000);
        assert!(!degraded);
        assert!(prompt.contains("// one"));
    }

    #[test]
    fn test_fit_prompt_strips_comments_first() {
        let code = format!(
            "// {}\nexport const a = 1;\n",
            "commentary ".repeat(200)
        );
        let scaffolding = estimate_tokens(&build_prompt(&input("")));
        let (prompt, degraded) = fit_prompt(&input(&code), scaffolding + 50);
        assert!(degraded);
        assert!(!prompt.contains("commentary"));
        assert!(prompt.contains("export const a = 1;"));
    }

    #[test]
    fn test_fit_prompt_truncates_as_last_resort() {
        let code: String = (0..500).map(|i| format!("call{}();\n", i)).collect();
        let scaffolding = estimate_tokens(&build_prompt(&input("")));
        let budget = scaffolding + 40;
        let (prompt, degraded) = fit_prompt(&input(&code), budget);
        assert!(degraded);
        assert!(prompt.contains("call0();"));
        assert!(!prompt.contains("call499();"));
        assert!(estimate_tokens(&prompt) <= budget + 2);
    }
}
