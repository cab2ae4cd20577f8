// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;

use crate::error::{ApiError, ForgeError};
use crate::llm::provider::StopReason;

/// Build an HTTP client with a request timeout.
pub(crate) fn build_client(timeout: Duration) -> Client {
    match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "falling back to default HTTP client");
            Client::new()
        }
    }
}

/// Parse token counts from an arbitrary message by extracting the first numeric tokens.
pub(crate) fn parse_numeric_token_counts(message: &str) -> (u32, u32) {
    let numbers: Vec<u32> = message
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|s| s.parse().ok())
        .collect();

    match numbers.as_slice() {
        [current, limit, ..] => (*current, *limit),
        [single] => (*single, 0),
        _ => (0, 0),
    }
}

/// Parse numeric Retry-After header (seconds).
pub(crate) fn parse_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Construct a standardized server error.
pub(crate) fn server_error(status: u16, message: impl Into<String>) -> ForgeError {
    ForgeError::Api(ApiError::ServerError {
        status,
        message: message.into(),
    })
}

/// Map a transport failure, calling out unreachable local servers.
pub(crate) fn transport_error(e: reqwest::Error, unreachable_hint: &str) -> ForgeError {
    if e.is_connect() {
        ForgeError::Api(ApiError::Network(unreachable_hint.to_string()))
    } else if e.is_timeout() {
        ForgeError::Api(ApiError::Timeout)
    } else {
        ForgeError::Http(e)
    }
}

/// True when a reply holds nothing but whitespace and code-fence openers.
///
/// A sentinel stop sequence that fires inside a fence leaves just the
/// opener behind.
pub(crate) fn is_blank_reply(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        match line.strip_prefix("```") {
            Some(lang) => lang
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-')),
            None => line.is_empty(),
        }
    })
}

/// Resolve a stop reason from an OpenAI/Ollama style finish string.
///
/// Neither API says which condition ended a "stop"; an empty answer to a
/// request that carried stop sequences means one fired on the first token.
pub(crate) fn resolve_stop_reason(
    finish: Option<&str>,
    has_tool_calls: bool,
    text_is_blank: bool,
    had_stop_sequences: bool,
) -> Option<StopReason> {
    if has_tool_calls {
        return Some(StopReason::ToolUse);
    }
    match finish {
        Some("length") => Some(StopReason::MaxTokens),
        Some("tool_calls") | Some("function_call") => Some(StopReason::ToolUse),
        Some(_) if had_stop_sequences && text_is_blank => Some(StopReason::StopSequence),
        Some(_) => Some(StopReason::EndTurn),
        None => None,
    }
}
