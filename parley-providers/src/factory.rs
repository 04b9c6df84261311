//! Build a provider client from configuration

use parley_core::config::{ProviderConfig, ProvidersConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::base::{LLMProvider, ProviderError, ProviderResult};
use crate::ollama::OllamaClient;
use crate::openai::OpenAIClient;
use crate::registry::{ApiType, ProviderRegistry, ProviderSpec};

/// A provider name and model after `provider/model` prefixes are resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTarget {
    pub provider: String,
    pub model: String,
}

impl ProviderTarget {
    /// Resolve the target for `model`, falling back to `default_provider`
    /// when the model carries no known provider prefix.
    pub fn resolve(registry: &ProviderRegistry, default_provider: &str, model: &str) -> Self {
        match registry.split_model(model) {
            Some((spec, bare)) => Self {
                provider: spec.name.clone(),
                model: bare.to_string(),
            },
            None => Self {
                provider: default_provider.to_string(),
                model: model.to_string(),
            },
        }
    }
}

/// Build the client for `target`.
///
/// Fails with [`ProviderError::ConfigError`] when the provider is unknown or
/// its credentials or endpoint are missing.
pub fn build_provider(
    providers: &ProvidersConfig,
    target: &ProviderTarget,
) -> ProviderResult<Arc<dyn LLMProvider>> {
    let registry = ProviderRegistry::new();
    let spec = registry.find_by_name(&target.provider).ok_or_else(|| {
        ProviderError::ConfigError(format!("Unknown provider: {}", target.provider))
    })?;
    let config = providers.get(&spec.name).ok_or_else(|| {
        ProviderError::ConfigError(format!("No configuration section for {}", spec.name))
    })?;

    let model = if target.model.trim().is_empty() {
        spec.default_model.clone()
    } else {
        target.model.clone()
    };
    let timeout = config.timeout_secs.map(Duration::from_secs);
    let extra_headers = config
        .extra_headers
        .clone()
        .filter(|headers| !headers.is_empty());

    debug!("Building {} provider for model {}", spec.name, model);

    let provider: Arc<dyn LLMProvider> = match spec.api_type {
        ApiType::Ollama => Arc::new(OllamaClient::new(
            api_base(config, spec),
            model,
            extra_headers,
            timeout,
        )),
        ApiType::Openai => Arc::new(OpenAIClient::new(
            Some(require_api_key(config, spec)?),
            api_base(config, spec),
            model,
            extra_headers,
            timeout,
        )),
        ApiType::Azure => {
            let api_key = require_api_key(config, spec)?;
            let endpoint = api_base(config, spec).ok_or_else(|| {
                ProviderError::ConfigError(
                    "Azure OpenAI endpoint is not set (AZURE_OPENAI_ENDPOINT or providers.azure.api_base)"
                        .to_string(),
                )
            })?;
            let deployment = config
                .deployment
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(model);
            Arc::new(OpenAIClient::azure(
                api_key,
                endpoint,
                deployment,
                config.api_version.clone(),
                extra_headers,
                timeout,
            ))
        }
    };

    Ok(provider)
}

fn api_base(config: &ProviderConfig, spec: &ProviderSpec) -> Option<String> {
    config
        .api_base
        .clone()
        .filter(|base| !base.trim().is_empty())
        .or_else(|| Some(spec.default_api_base.clone()).filter(|base| !base.is_empty()))
}

fn require_api_key(config: &ProviderConfig, spec: &ProviderSpec) -> ProviderResult<String> {
    if config.api_key.trim().is_empty() {
        return Err(ProviderError::ConfigError(format!(
            "{} API key is not set ({} or providers.{}.api_key)",
            spec.label(),
            spec.env_key,
            spec.name
        )));
    }
    Ok(config.api_key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(provider: &str, model: &str) -> ProviderTarget {
        ProviderTarget {
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }

    #[test]
    fn test_resolve_target() {
        let registry = ProviderRegistry::new();
        assert_eq!(
            ProviderTarget::resolve(&registry, "ollama", "azure/gpt-4"),
            target("azure", "gpt-4")
        );
        assert_eq!(
            ProviderTarget::resolve(&registry, "ollama", "gemma:7b"),
            target("ollama", "gemma:7b")
        );
    }

    #[test]
    fn test_build_ollama_needs_no_credentials() {
        let provider = build_provider(&ProvidersConfig::default(), &target("ollama", "")).unwrap();
        assert_eq!(provider.get_default_model(), "gemma:7b");
    }

    #[test]
    fn test_build_openai_requires_key() {
        let err = build_provider(&ProvidersConfig::default(), &target("openai", "gpt-4o"))
            .err()
            .unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_build_azure_requires_endpoint() {
        let mut providers = ProvidersConfig::default();
        providers.azure.api_key = "azure-key".to_string();

        let err = build_provider(&providers, &target("azure", "gpt-4"))
            .err()
            .unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("AZURE_OPENAI_ENDPOINT"));

        providers.azure.api_base = Some("https://example.openai.azure.com".to_string());
        providers.azure.deployment = Some("chat-deployment".to_string());
        let provider = build_provider(&providers, &target("azure", "gpt-4")).unwrap();
        assert_eq!(provider.get_default_model(), "chat-deployment");
    }

    #[test]
    fn test_build_unknown_provider() {
        let err = build_provider(&ProvidersConfig::default(), &target("bard", "x"))
            .err()
            .unwrap();
        assert!(err.is_config());
    }
}
