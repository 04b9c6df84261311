//! Ollama native chat API client

use async_trait::async_trait;
use parley_core::GenerationParameters;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::base::{
    api_error, http_client, LLMProvider, LLMResponse, Message, ProviderError, ProviderResult,
};

pub const DEFAULT_OLLAMA_API_BASE: &str = "http://localhost:11434";

/// `/api/chat` request format
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

/// Sampling options, passed through as given
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// `/api/chat` non-streaming response format
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<i64>,
    #[serde(default)]
    eval_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for a local (or remote) Ollama server
pub struct OllamaClient {
    client: Client,
    api_base: String,
    default_model: String,
    extra_headers: HashMap<String, String>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(
        api_base: Option<String>,
        default_model: String,
        extra_headers: Option<HashMap<String, String>>,
        timeout: Option<Duration>,
    ) -> Self {
        let api_base = api_base
            .filter(|base| !base.trim().is_empty())
            .map(|base| normalize_host(&base))
            .unwrap_or_else(|| DEFAULT_OLLAMA_API_BASE.to_string());

        Self {
            client: http_client(timeout),
            api_base,
            default_model,
            extra_headers: extra_headers.unwrap_or_default(),
        }
    }

    /// Base URL requests are sent to
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        model: String,
        params: &GenerationParameters,
        max_tokens: Option<u32>,
    ) -> OllamaChatRequest {
        OllamaChatRequest {
            model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                top_k: params.top_k,
                top_p: params.top_p,
                num_predict: max_tokens,
            },
        }
    }

    fn parse_response(response: OllamaChatResponse) -> ProviderResult<LLMResponse> {
        let message = response
            .message
            .ok_or_else(|| ProviderError::InvalidResponse("No message in response".to_string()))?;

        let mut usage = HashMap::new();
        let prompt_tokens = response.prompt_eval_count.unwrap_or_default();
        let completion_tokens = response.eval_count.unwrap_or_default();
        usage.insert("prompt_tokens".to_string(), prompt_tokens);
        usage.insert("completion_tokens".to_string(), completion_tokens);
        usage.insert("total_tokens".to_string(), prompt_tokens + completion_tokens);

        Ok(LLMResponse {
            content: message.content,
            finish_reason: response.done_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

/// `OLLAMA_HOST` is often given without a scheme (`0.0.0.0:11434`)
fn normalize_host(base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        base.to_string()
    } else {
        format!("http://{}", base)
    }
}

#[async_trait]
impl LLMProvider for OllamaClient {
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        params: &GenerationParameters,
        max_tokens: Option<u32>,
    ) -> ProviderResult<LLMResponse> {
        let model = model.unwrap_or_else(|| self.default_model.clone());
        let request = self.build_request(messages, model.clone(), params, max_tokens);

        debug!(
            "Sending chat request to {} with model {} (temperature {}, top_k {:?}, top_p {:?})",
            self.api_base, model, params.temperature, params.top_k, params.top_p
        );

        let url = format!("{}/api/chat", self.api_base);
        let mut req_builder = self.client.post(&url).json(&request);
        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        let response = req_builder.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let response_data: OllamaChatResponse = response.json().await?;
        Self::parse_response(response_data)
    }

    fn get_default_model(&self) -> String {
        self.default_model.clone()
    }
}
