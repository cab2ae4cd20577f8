// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Utility functions for testforge
//!
//! Small pure helpers shared by the planner, prompt builder and orchestrator.

use crate::error::{ApiError, ForgeError};

/// Characters per token used by the cheap token estimate.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a piece of text.
///
/// This is a length-based proxy, not a tokenizer. Callers treat the result as
/// a soft bound and keep headroom.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    chars.div_ceil(CHARS_PER_TOKEN) as u32
}

/// Number of characters that roughly fit in `tokens` tokens.
pub fn tokens_to_chars(tokens: u32) -> usize {
    tokens as usize * CHARS_PER_TOKEN
}

/// Truncate text to at most `max_chars` characters keeping both ends.
///
/// The head carries the first error lines and the tail carries the summary a
/// compiler or test runner prints last, so both are preserved.
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let marker = "\n... [truncated] ...\n";
    let budget = max_chars.saturating_sub(marker.len());
    let head_len = budget * 2 / 3;
    let tail_len = budget - head_len;

    let head: String = text.chars().take(head_len).collect();
    let tail: String = text
        .chars()
        .skip(total - tail_len)
        .collect::<String>();

    format!("{}{}{}", head, marker, tail)
}

/// Truncate text to `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_end(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Summarize a failure as its first few non-empty lines, capped in length.
pub fn summarize_failure(text: &str, max_lines: usize, max_chars: usize) -> String {
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(max_lines)
        .collect::<Vec<_>>()
        .join(" | ");

    if joined.is_empty() {
        return "Unknown failure".to_string();
    }

    truncate_end(&joined, max_chars)
}

/// Format an error for display to the user
pub fn format_error(error: &ForgeError) -> String {
    match error {
        ForgeError::Api(ApiError::ContextTooLong { current, limit }) => {
            let mut msg = String::from("Context too long: ");
            if *current > 0 && *limit > 0 {
                msg.push_str(&format!(
                    "{} tokens exceeds {} token limit.\n",
                    format_number(*current),
                    format_number(*limit)
                ));
            } else {
                msg.push_str("prompt exceeds the model's context window.\n");
            }
            msg.push_str("Try a smaller --context-size so files are chunked more finely.");
            msg
        }
        ForgeError::Api(api_error) => format!("API Error: {}", api_error),
        _ => format!("Error: {}", error),
    }
}

/// Format a number with thousand separators for readability
pub fn format_number(n: u32) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}
