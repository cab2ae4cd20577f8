// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider factory for creating the configured generative backend

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{ForgeError, Result};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::{OllamaProvider, OpenAiProvider};

/// Factory for creating LLM providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the provider named in `settings.backend.provider`
    ///
    /// The returned `Arc` is shared by every worker of a run.
    pub async fn create(settings: &Settings, perform_health_check: bool) -> Result<Arc<dyn LlmProvider>> {
        match settings.backend.provider.as_str() {
            "ollama" => Self::create_ollama(settings, perform_health_check).await,
            "openai" => Self::create_openai(settings),
            other => Err(ForgeError::Config(format!(
                "Unknown provider '{}'. Supported: {}",
                other,
                Self::supported_providers().join(", ")
            ))),
        }
    }

    /// Create an Ollama provider
    pub async fn create_ollama(
        settings: &Settings,
        perform_health_check: bool,
    ) -> Result<Arc<dyn LlmProvider>> {
        let provider = OllamaProvider::with_base_url(settings.backend.resolved_base_url())
            .with_timeout(Duration::from_secs(settings.backend.timeout_secs));

        if perform_health_check {
            provider.health_check().await.map_err(|_| {
                ForgeError::Config(
                    "Ollama is not running. Start Ollama with: ollama serve".to_string(),
                )
            })?;
        }

        Ok(Arc::new(provider))
    }

    /// Create an OpenAI-compatible provider
    pub fn create_openai(settings: &Settings) -> Result<Arc<dyn LlmProvider>> {
        let api_key = settings.backend.api_key().ok_or_else(|| {
            ForgeError::Config(format!(
                "No API key found. Set the {} environment variable or backend.api_key in settings.",
                settings.backend.api_key_env
            ))
        })?;

        let provider = OpenAiProvider::with_base_url(api_key, settings.backend.resolved_base_url())
            .with_timeout(Duration::from_secs(settings.backend.timeout_secs));

        Ok(Arc::new(provider))
    }

    /// Check if the configured provider has the credentials it needs
    pub fn is_configured(settings: &Settings) -> bool {
        match settings.backend.provider.as_str() {
            "ollama" => true,
            "openai" => settings.backend.api_key().is_some(),
            _ => false,
        }
    }

    /// List all supported provider names
    pub fn supported_providers() -> &'static [&'static str] {
        &["ollama", "openai"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_ollama_without_health_check() {
        let settings = Settings::default();
        let provider = ProviderFactory::create(&settings, false).await.unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[tokio::test]
    async fn test_create_unknown_provider() {
        let mut settings = Settings::default();
        settings.backend.provider = "nope".to_string();
        let err = ProviderFactory::create(&settings, false).await.err().unwrap();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn test_create_openai_no_key() {
        let mut settings = Settings::default();
        settings.backend.provider = "openai".to_string();
        settings.backend.api_key = None;
        settings.backend.api_key_env = "TESTFORGE_NONEXISTENT_ENV_VAR_12345".to_string();

        assert!(ProviderFactory::create_openai(&settings).is_err());
        assert!(!ProviderFactory::is_configured(&settings));
    }

    #[test]
    fn test_create_openai_with_key() {
        let mut settings = Settings::default();
        settings.backend.provider = "openai".to_string();
        settings.backend.api_key = Some("sk-test".to_string());
        settings.backend.api_key_env = "TESTFORGE_NONEXISTENT_ENV_VAR_12345".to_string();

        let provider = ProviderFactory::create_openai(&settings).unwrap();
        assert_eq!(provider.name(), "openai");
        assert!(ProviderFactory::is_configured(&settings));
    }

    #[test]
    fn test_supported_providers() {
        let providers = ProviderFactory::supported_providers();
        assert!(providers.contains(&"ollama"));
        assert!(providers.contains(&"openai"));
    }
}
