//! OpenAI-compatible chat completions client, including Azure OpenAI deployments

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

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_AZURE_API_VERSION: &str = "2023-05-15";

/// Chat completions request format
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    /// Azure routes by deployment and ignores the model field
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<Message>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat completions response format
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
    #[serde(default)]
    total_tokens: i64,
}

/// Where requests go and how they authenticate
#[derive(Debug, Clone)]
enum Endpoint {
    /// `{api_base}/chat/completions` with bearer auth
    OpenAi { api_base: String },
    /// `{endpoint}/openai/deployments/{deployment}/chat/completions` with an `api-key` header
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

/// OpenAI-compatible provider client
pub struct OpenAIClient {
    client: Client,
    endpoint: Endpoint,
    api_key: Option<String>,
    default_model: String,
    extra_headers: HashMap<String, String>,
}

impl OpenAIClient {
    /// Create a client for an OpenAI-compatible `/chat/completions` API
    pub fn new(
        api_key: Option<String>,
        api_base: Option<String>,
        default_model: String,
        extra_headers: Option<HashMap<String, String>>,
        timeout: Option<Duration>,
    ) -> Self {
        let api_base = api_base
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string());

        Self {
            client: http_client(timeout),
            endpoint: Endpoint::OpenAi {
                api_base: api_base.trim_end_matches('/').to_string(),
            },
            api_key,
            default_model,
            extra_headers: extra_headers.unwrap_or_default(),
        }
    }

    /// Create a client for an Azure OpenAI deployment
    pub fn azure(
        api_key: String,
        endpoint: String,
        deployment: String,
        api_version: Option<String>,
        extra_headers: Option<HashMap<String, String>>,
        timeout: Option<Duration>,
    ) -> Self {
        let api_version = api_version
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());

        Self {
            client: http_client(timeout),
            endpoint: Endpoint::Azure {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                deployment: deployment.clone(),
                api_version,
            },
            api_key: Some(api_key),
            default_model: deployment,
            extra_headers: extra_headers.unwrap_or_default(),
        }
    }

    fn url(&self) -> String {
        match &self.endpoint {
            Endpoint::OpenAi { api_base } => format!("{}/chat/completions", api_base),
            Endpoint::Azure {
                endpoint,
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, deployment, api_version
            ),
        }
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        model: String,
        params: &GenerationParameters,
        max_tokens: Option<u32>,
    ) -> ChatCompletionRequest {
        if params.top_k.is_some() {
            debug!("top_k is not supported by chat completions APIs; dropping it");
        }

        ChatCompletionRequest {
            model: match self.endpoint {
                Endpoint::OpenAi { .. } => Some(model),
                Endpoint::Azure { .. } => None,
            },
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens,
        }
    }

    fn apply_headers(&self, mut req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            req_builder = match self.endpoint {
                Endpoint::OpenAi { .. } => {
                    req_builder.header("Authorization", format!("Bearer {}", api_key))
                }
                Endpoint::Azure { .. } => req_builder.header("api-key", api_key),
            };
        }

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        req_builder
    }

    /// Parse a chat completions response into our standard format
    fn parse_response(&self, response: ChatCompletionResponse) -> ProviderResult<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        let mut usage = HashMap::new();
        usage.insert("prompt_tokens".to_string(), response.usage.prompt_tokens);
        usage.insert(
            "completion_tokens".to_string(),
            response.usage.completion_tokens,
        );
        usage.insert("total_tokens".to_string(), response.usage.total_tokens);

        Ok(LLMResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        params: &GenerationParameters,
        max_tokens: Option<u32>,
    ) -> ProviderResult<LLMResponse> {
        let model = model.unwrap_or_else(|| self.default_model.clone());
        let request = self.build_request(messages, model.clone(), params, max_tokens);

        let url = self.url();
        debug!(
            "Sending chat request to {} with model {} (temperature {})",
            url, model, params.temperature
        );

        let req_builder = self.apply_headers(self.client.post(&url).json(&request));
        let response = req_builder.send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let response_data: ChatCompletionResponse = response.json().await?;
        self.parse_response(response_data)
    }

    fn get_default_model(&self) -> String {
        self.default_model.clone()
    }
}
