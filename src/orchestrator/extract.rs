// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Pulling one code unit out of a raw backend answer

use std::sync::LazyLock;

use regex::Regex;

use crate::llm::provider::StopReason;
use crate::verify::count_test_cases;

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_+-]*[ \t]*$").unwrap());

static TEST_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^|[^.\w$])describe\s*\(").unwrap());

/// What came out of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Code(String),
    /// The backend declared the input untestable
    Skip,
    /// Nothing usable
    Nothing,
}

/// Fenced blocks in order of appearance. An unterminated last fence runs
/// to the end of the text, which happens when the token ceiling cuts an
/// answer short.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let fences: Vec<_> = FENCE_OPEN.find_iter(text).collect();
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < fences.len() {
        let start = (fences[i].end() + 1).min(text.len());
        match fences.get(i + 1) {
            Some(close) => {
                blocks.push(&text[start..close.start()]);
                i += 2;
            }
            None => {
                blocks.push(&text[start..]);
                i += 1;
            }
        }
    }
    blocks
}

fn is_sentinel(text: &str, sentinel: &str) -> bool {
    !sentinel.is_empty() && text.trim() == sentinel.trim()
}

fn looks_like_test(text: &str) -> bool {
    count_test_cases(text) > 0 || TEST_SHAPE.is_match(text)
}

/// Extract the candidate test file from `text`.
///
/// A fenced block wins; among several, the first one that looks like a
/// test. Raw text is accepted only when it already looks like a test and
/// carries no skip sentinel.
pub fn extract(text: &str, sentinel: &str, stop_reason: Option<StopReason>) -> Extraction {
    let text = text.replace("\r\n", "\n");
    let text = text.as_str();
    let trimmed = text.trim();

    if is_sentinel(trimmed, sentinel)
        || (!sentinel.is_empty() && trimmed.starts_with(sentinel.trim()))
    {
        return Extraction::Skip;
    }

    let blocks: Vec<&str> = fenced_blocks(text)
        .into_iter()
        .filter(|b| !b.trim().is_empty())
        .collect();

    if let Some(block) = blocks
        .iter()
        .find(|b| looks_like_test(b))
        .or_else(|| blocks.first())
    {
        if is_sentinel(block, sentinel) {
            return Extraction::Skip;
        }
        return Extraction::Code(block.to_string());
    }

    if looks_like_test(trimmed) && (sentinel.is_empty() || !trimmed.contains(sentinel.trim())) {
        return Extraction::Code(trimmed.to_string());
    }

    // Stop sequence fired before anything useful was produced
    if stop_reason == Some(StopReason::StopSequence) {
        return Extraction::Skip;
    }

    Extraction::Nothing
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: &str = "// SKIP";

    #[test]
    fn test_extract_fenced_block() {
        let text = "Here you go:\n```ts\nimport { add } from '../math';\nit('adds', () => {});\n```\nDone.";
        assert_eq!(
            extract(text, SENTINEL, Some(StopReason::EndTurn)),
            Extraction::Code("import { add } from '../math';\nit('adds', () => {});\n".to_string())
        );
    }

    #[test]
    fn test_extract_prefers_test_shaped_block() {
        let text = "```bash\nnpm i -D vitest\n```\n\n```typescript\ntest('x', () => {});\n```\n";
        assert_eq!(
            extract(text, SENTINEL, None),
            Extraction::Code("test('x', () => {});\n".to_string())
        );
    }

    #[test]
    fn test_extract_unterminated_fence() {
        let text = "```ts\ndescribe('a', () => {\n  it('b', () => {";
        match extract(text, SENTINEL, Some(StopReason::MaxTokens)) {
            Extraction::Code(code) => assert!(code.starts_with("describe('a'")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extract_fence_cut_by_stop_sequence_is_skip() {
        assert_eq!(
            extract("```ts\n", SENTINEL, Some(StopReason::StopSequence)),
            Extraction::Skip
        );
    }

    #[test]
    fn test_extract_raw_test_text() {
        let text = "import { it } from 'vitest';\nit('works', () => {});";
        assert_eq!(
            extract(text, SENTINEL, None),
            Extraction::Code(text.to_string())
        );
    }

    #[test]
    fn test_extract_raw_prose_is_nothing() {
        assert_eq!(
            extract("I cannot help with that.", SENTINEL, Some(StopReason::EndTurn)),
            Extraction::Nothing
        );
        assert_eq!(extract("", SENTINEL, Some(StopReason::EndTurn)), Extraction::Nothing);
    }

    #[test]
    fn test_extract_sentinel() {
        assert_eq!(extract("// SKIP", SENTINEL, None), Extraction::Skip);
        assert_eq!(extract("  // SKIP\nnothing to test", SENTINEL, None), Extraction::Skip);
        assert_eq!(extract("```ts\n// SKIP\n```", SENTINEL, None), Extraction::Skip);
    }

    #[test]
    fn test_extract_raw_text_with_sentinel_is_rejected() {
        let text = "it('a', () => {});\n// SKIP";
        assert_eq!(extract(text, SENTINEL, None), Extraction::Nothing);
    }

    #[test]
    fn test_extract_stop_sequence_with_empty_text() {
        assert_eq!(
            extract("", SENTINEL, Some(StopReason::StopSequence)),
            Extraction::Skip
        );
    }
}
