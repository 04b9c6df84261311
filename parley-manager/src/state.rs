use parley_agent::TurnExecutor;
use parley_core::GenerationParameters;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone)]
pub struct AppState {
    /// Executor over the hot-swappable provider
    pub executor: Arc<TurnExecutor>,
    /// Parameters used for fields a chat request leaves out
    pub defaults: GenerationParameters,
    pub api_tx: mpsc::Sender<ManagerCommand>,
}

pub enum ManagerCommand {
    GetConfig(oneshot::Sender<ConfigResponse>),
    UpdateConfig(ConfigUpdate, oneshot::Sender<Result<ConfigResponse, String>>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub provider: String,
    pub model: String,
    pub api_base: Option<String>,
    // The key itself is never returned
    pub has_api_key: bool,
}
