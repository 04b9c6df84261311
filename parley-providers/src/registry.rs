//! Provider registry - single source of truth for provider metadata

use serde::{Deserialize, Serialize};

/// Wire protocol a provider speaks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiType {
    /// Ollama native `/api/chat`
    Ollama,
    /// OpenAI `/chat/completions`
    #[default]
    Openai,
    /// Azure OpenAI deployment routing
    Azure,
}

/// One LLM provider's metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    #[serde(default)]
    pub api_type: ApiType,
    pub display_name: String,
    /// Environment variable holding the credential (or host for local providers)
    pub env_key: String,
    pub default_api_base: String,
    pub default_model: String,
    pub is_local: bool,
    pub requires_api_key: bool,
    pub supports_top_k: bool,
}

impl ProviderSpec {
    pub fn label(&self) -> String {
        if !self.display_name.is_empty() {
            self.display_name.clone()
        } else {
            self.name.clone()
        }
    }
}

/// Registry of available LLM providers
pub struct ProviderRegistry {
    providers: Vec<ProviderSpec>,
}

impl ProviderRegistry {
    /// Create a new provider registry with the built-in providers
    pub fn new() -> Self {
        Self {
            providers: Self::default_providers(),
        }
    }

    /// Get all provider specs
    pub fn all(&self) -> &[ProviderSpec] {
        &self.providers
    }

    /// Find a provider by config field name
    pub fn find_by_name(&self, name: &str) -> Option<&ProviderSpec> {
        self.providers.iter().find(|spec| spec.name == name)
    }

    /// Split a `provider/model` reference.
    ///
    /// Returns the provider named by the prefix and the bare model, or `None`
    /// when the prefix is not a known provider (model names such as
    /// `library/gemma` are left alone).
    pub fn split_model<'a>(&self, model: &'a str) -> Option<(&ProviderSpec, &'a str)> {
        let (prefix, rest) = model.split_once('/')?;
        if rest.is_empty() {
            return None;
        }
        self.find_by_name(prefix).map(|spec| (spec, rest))
    }

    fn default_providers() -> Vec<ProviderSpec> {
        let yaml = include_str!("providers.yaml");
        serde_yaml::from_str(yaml).expect("Failed to parse default providers configuration")
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_providers() {
        let registry = ProviderRegistry::new();
        let names: Vec<&str> = registry.all().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ollama", "azure", "openai"]);
    }

    #[test]
    fn test_find_by_name() {
        let registry = ProviderRegistry::new();
        let spec = registry.find_by_name("ollama").unwrap();
        assert_eq!(spec.api_type, ApiType::Ollama);
        assert!(spec.is_local);
        assert!(!spec.requires_api_key);
        assert_eq!(spec.default_model, "gemma:7b");

        let spec = registry.find_by_name("azure").unwrap();
        assert_eq!(spec.label(), "Azure OpenAI");
        assert!(!spec.supports_top_k);

        assert!(registry.find_by_name("anthropic").is_none());
    }

    #[test]
    fn test_split_model() {
        let registry = ProviderRegistry::new();

        let (spec, model) = registry.split_model("ollama/gemma:7b").unwrap();
        assert_eq!(spec.name, "ollama");
        assert_eq!(model, "gemma:7b");

        assert!(registry.split_model("gemma:7b").is_none());
        assert!(registry.split_model("library/gemma").is_none());
        assert!(registry.split_model("openai/").is_none());
    }
}
