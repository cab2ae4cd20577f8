// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for testforge
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;

/// Main error type for testforge operations
#[derive(Error, Debug)]
pub enum ForgeError {
    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Planning errors (scan, budget, chunking)
    #[error("Planning error: {0}")]
    Planning(String),

    /// Run-state persistence errors
    #[error("State error: {0}")]
    State(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Context window exceeded
    #[error("Context too long: {current} tokens exceeds limit of {limit}")]
    ContextTooLong { current: u32, limit: u32 },

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,
}

/// Result type alias for testforge operations
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forge_error_config() {
        let err = ForgeError::Config("bad config".to_string());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_forge_error_planning() {
        let err = ForgeError::Planning("no files".to_string());
        assert_eq!(err.to_string(), "Planning error: no files");
    }

    #[test]
    fn test_forge_error_state() {
        let err = ForgeError::State("locked".to_string());
        assert!(err.to_string().contains("State error"));
    }

    #[test]
    fn test_forge_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ForgeError = io_err.into();
        assert!(matches!(err, ForgeError::Io(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_forge_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ForgeError = json_err.into();
        assert!(matches!(err, ForgeError::Json(_)));
    }

    #[test]
    fn test_api_error_context_too_long() {
        let err = ApiError::ContextTooLong {
            current: 10000,
            limit: 8000,
        };
        let msg = err.to_string();
        assert!(msg.contains("10000"));
        assert!(msg.contains("8000"));
    }

    #[test]
    fn test_api_error_server_error() {
        let err = ApiError::ServerError {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error (503): overloaded");
    }

    #[test]
    fn test_forge_error_from_api_error() {
        let err: ForgeError = ApiError::Timeout.into();
        assert!(matches!(err, ForgeError::Api(ApiError::Timeout)));
        assert!(err.to_string().contains("timed out"));
    }
}
