//! Client for a running `parley serve` instance

use anyhow::{Context, Result};
use parley_core::{GenerationParameters, Session, Turn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    message: &'a str,
    history: Vec<(String, String)>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

/// The server also echoes a history; the client keeps its own instead
#[derive(Deserialize)]
struct ChatReply {
    reply: Option<String>,
    error: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Run one turn remotely. The session stays with the caller; the server
    /// only sees it for the duration of the request.
    pub async fn chat(
        &self,
        message: &str,
        session: &Session,
        params: &GenerationParameters,
    ) -> Result<(String, Session)> {
        let url = format!("{}/api/chat", self.base_url);
        let payload = ChatPayload {
            message,
            history: session.pairs(),
            temperature: params.temperature,
            top_k: params.top_k,
            top_p: params.top_p,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        let body: ChatReply = response
            .json()
            .await
            .with_context(|| format!("Unexpected response from {} ({})", url, status))?;

        if !status.is_success() {
            anyhow::bail!(
                "Server returned {}: {}",
                status,
                body.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        let reply = body.reply.context("Server response has no reply")?;
        let updated = session.with_turn(Turn::new(message, reply.clone()));
        Ok((reply, updated))
    }
}
