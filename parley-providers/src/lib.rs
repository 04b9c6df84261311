//! LLM provider integrations for parley
//!
//! This crate provides the provider abstraction and clients for Ollama,
//! OpenAI-compatible APIs and Azure OpenAI deployments.

pub mod base;
pub mod factory;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use base::{LLMProvider, LLMResponse, Message, ProviderError, ProviderResult};
pub use factory::{build_provider, ProviderTarget};
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use registry::{ApiType, ProviderRegistry, ProviderSpec};

use async_trait::async_trait;
use parley_core::GenerationParameters;
use std::sync::{Arc, RwLock};

/// A provider that allows hot-swapping the underlying implementation.
///
/// A turn already in flight keeps the provider it started with.
pub struct DynamicProvider {
    inner: RwLock<Arc<dyn LLMProvider>>,
}

impl DynamicProvider {
    /// Create a new dynamic provider
    pub fn new(initial: Arc<dyn LLMProvider>) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    /// Update the underlying provider
    pub fn update(&self, new_provider: Arc<dyn LLMProvider>) {
        let mut lock = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *lock = new_provider;
    }

    /// Get the current provider
    pub fn current(&self) -> Arc<dyn LLMProvider> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl LLMProvider for DynamicProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        params: &GenerationParameters,
        max_tokens: Option<u32>,
    ) -> ProviderResult<LLMResponse> {
        let provider = self.current();
        provider.chat(messages, model, params, max_tokens).await
    }

    fn get_default_model(&self) -> String {
        self.current().get_default_model()
    }
}
