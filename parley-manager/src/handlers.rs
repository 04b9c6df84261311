use axum::{extract::State, http::StatusCode, Json};
use parley_agent::TurnError;
use parley_core::{GenerationParameters, Session};
use parley_providers::{ProviderRegistry, ProviderSpec};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::state::{AppState, ConfigResponse, ConfigUpdate, ManagerCommand};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Prior `(user, assistant)` pairs, oldest first
    #[serde(default)]
    pub history: Vec<(String, String)>,
    pub temperature: Option<f64>,
    pub top_k: Option<u32>,
    pub top_p: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    pub history: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    fn failed(history: Vec<(String, String)>, error: impl ToString) -> Self {
        Self {
            reply: None,
            history,
            error: Some(error.to_string()),
        }
    }
}

/// Run one turn on the history the client sent.
///
/// On any failure the client's history comes back unchanged.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    let params = GenerationParameters {
        temperature: payload.temperature.unwrap_or(state.defaults.temperature),
        top_k: payload.top_k.or(state.defaults.top_k),
        top_p: payload.top_p.or(state.defaults.top_p),
    };
    if let Err(e) = params.validate() {
        tracing::warn!("Rejected chat request: {}", e);
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ChatResponse::failed(payload.history, e)),
        );
    }

    let session = Session::from_pairs(payload.history);
    match state
        .executor
        .execute_turn(&payload.message, &session, &params)
        .await
    {
        Ok((reply, updated)) => (
            StatusCode::OK,
            Json(ChatResponse {
                reply: Some(reply),
                history: updated.pairs(),
                error: None,
            }),
        ),
        Err(e) => {
            let status = match &e {
                TurnError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                TurnError::Provider(_) => StatusCode::BAD_GATEWAY,
            };
            tracing::error!("Chat turn failed: {}", e);
            (status, Json(ChatResponse::failed(session.pairs(), e)))
        }
    }
}

pub async fn get_config_handler(
    State(state): State<AppState>,
) -> Result<Json<ConfigResponse>, (StatusCode, Json<serde_json::Value>)> {
    let (tx, rx) = oneshot::channel();
    if let Err(e) = state.api_tx.send(ManagerCommand::GetConfig(tx)).await {
        tracing::error!("Failed to send GetConfig request: {}", e);
        return Err(manager_unavailable());
    }

    match rx.await {
        Ok(resp) => Ok(Json(resp)),
        Err(e) => {
            tracing::error!("Failed to receive GetConfig response: {}", e);
            Err(manager_unavailable())
        }
    }
}

pub async fn update_config_handler(
    State(state): State<AppState>,
    Json(payload): Json<ConfigUpdate>,
) -> (StatusCode, Json<serde_json::Value>) {
    tracing::info!(
        "Received update config request (provider: {:?}, model: {:?})",
        payload.provider,
        payload.model
    );
    let (tx, rx) = oneshot::channel();
    if let Err(e) = state
        .api_tx
        .send(ManagerCommand::UpdateConfig(payload, tx))
        .await
    {
        tracing::error!("Failed to send UpdateConfig request: {}", e);
        return manager_unavailable();
    }

    match rx.await {
        Ok(Ok(config)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok", "config": config })),
        ),
        Ok(Err(message)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "status": "error", "message": message })),
        ),
        Err(e) => {
            tracing::error!("Failed to receive UpdateConfig response: {}", e);
            manager_unavailable()
        }
    }
}

pub async fn get_providers_handler() -> Json<Vec<ProviderSpec>> {
    let registry = ProviderRegistry::new();
    Json(registry.all().to_vec())
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn manager_unavailable() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "status": "error", "message": "manager is not running" })),
    )
}
