// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retry logic for backend calls with exponential backoff
//!
//! Transport failures are retried here. Semantic failures (bad code, failing
//! tests) are the orchestrator's attempt loop and never reach this layer.

use crate::config::settings::ResilienceConfig;
use crate::error::{ApiError, ForgeError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay in milliseconds (exponentially increased)
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Jitter percentage (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RetryConfig {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: 0.0,
        }
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential_ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped_ms = exponential_ms.min(self.max_delay_ms);

        let jitter_range = (capped_ms as f64 * self.jitter) as i64;
        let jitter_ms = if jitter_range > 0 {
            rand::rng().random_range(-jitter_range..=jitter_range)
        } else {
            0
        };

        let final_ms = (capped_ms as i64 + jitter_ms).max(0) as u64;
        Duration::from_millis(final_ms)
    }
}

/// Whether a failed backend call is worth retrying
pub fn is_retryable(error: &ForgeError) -> bool {
    match error {
        ForgeError::Api(api_error) => match api_error {
            ApiError::Network(_) | ApiError::RateLimited(_) | ApiError::Timeout => true,
            ApiError::ServerError { status, .. } => (500..600).contains(status),
            ApiError::AuthenticationFailed
            | ApiError::ModelNotFound(_)
            | ApiError::ContextTooLong { .. }
            | ApiError::InvalidResponse(_) => false,
        },
        ForgeError::Http(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

/// Run `operation`, retrying transient failures with exponential backoff.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    config: Option<RetryConfig>,
    operation_name: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let config = config.unwrap_or_default();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if !is_retryable(&error) {
                    tracing::debug!(operation = operation_name, %error, "non-retryable error");
                    return Err(error);
                }

                if attempt >= config.max_retries {
                    tracing::warn!(
                        operation = operation_name,
                        retries = config.max_retries,
                        %error,
                        "retries exhausted"
                    );
                    return Err(error);
                }

                let delay = config.calculate_delay(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "transient failure, retrying"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_calculate_delay_exponential_and_capped() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 4000,
            jitter: 0.0,
        };

        assert_eq!(config.calculate_delay(0).as_millis(), 500);
        assert_eq!(config.calculate_delay(1).as_millis(), 1000);
        assert_eq!(config.calculate_delay(2).as_millis(), 2000);
        assert_eq!(config.calculate_delay(3).as_millis(), 4000);
        assert_eq!(config.calculate_delay(10).as_millis(), 4000);
    }

    #[test]
    fn test_calculate_delay_with_jitter_in_range() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 1000,
            max_delay_ms: 16000,
            jitter: 0.25,
        };
        for _ in 0..20 {
            let ms = config.calculate_delay(0).as_millis();
            assert!((750..=1250).contains(&ms));
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&ForgeError::Api(ApiError::Timeout)));
        assert!(is_retryable(&ForgeError::Api(ApiError::RateLimited(5))));
        assert!(is_retryable(&ForgeError::Api(ApiError::ServerError {
            status: 502,
            message: String::new()
        })));
        assert!(!is_retryable(&ForgeError::Api(ApiError::ServerError {
            status: 400,
            message: String::new()
        })));
        assert!(!is_retryable(&ForgeError::Api(
            ApiError::AuthenticationFailed
        )));
        assert!(!is_retryable(&ForgeError::Config("x".to_string())));
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = with_retry(
            || {
                let c = c.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(ForgeError::Api(ApiError::Network("reset".to_string())))
                    } else {
                        Ok(42)
                    }
                }
            },
            Some(fast()),
            "test",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_non_retryable() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result: Result<()> = with_retry(
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(ForgeError::Api(ApiError::AuthenticationFailed))
                }
            },
            Some(fast()),
            "test",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result: Result<()> = with_retry(
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(ForgeError::Api(ApiError::Timeout))
                }
            },
            Some(fast()),
            "test",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
