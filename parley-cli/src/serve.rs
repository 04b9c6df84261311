//! `parley serve`: the HTTP chat surface

use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use parley_agent::TurnExecutor;
use parley_core::config::{Config, ConfigLoader};
use parley_core::GenerationParameters;
use parley_manager::{run_server, AppState, Manager};
use parley_providers::{
    build_provider, DynamicProvider, LLMProvider, LLMResponse, Message, ProviderError,
    ProviderRegistry, ProviderResult, ProviderTarget,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Stands in until `POST /api/config` supplies a working provider
struct Unconfigured {
    reason: String,
    model: String,
}

#[async_trait]
impl LLMProvider for Unconfigured {
    async fn chat(
        &self,
        _messages: Vec<Message>,
        _model: Option<String>,
        _params: &GenerationParameters,
        _max_tokens: Option<u32>,
    ) -> ProviderResult<LLMResponse> {
        Err(ProviderError::ConfigError(self.reason.clone()))
    }

    fn get_default_model(&self) -> String {
        self.model.clone()
    }
}

pub async fn run_serve(
    loader: &ConfigLoader,
    config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr = tokio::net::lookup_host((host.as_str(), port))
        .await
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?
        .next()
        .with_context(|| format!("{}:{} did not resolve", host, port))?;

    let target = ProviderTarget::resolve(
        &ProviderRegistry::new(),
        &config.chat.provider,
        &config.chat.model,
    );
    let initial: Arc<dyn LLMProvider> = match build_provider(&config.providers, &target) {
        Ok(provider) => provider,
        Err(e) => {
            warn!(
                "Provider {} is not ready ({}); chat requests will fail until it is configured",
                target.provider, e
            );
            Arc::new(Unconfigured {
                reason: e.to_string(),
                model: target.model.clone(),
            })
        }
    };
    let provider = Arc::new(DynamicProvider::new(initial));

    let (api_tx, api_rx) = mpsc::channel(32);
    let state = AppState {
        executor: Arc::new(TurnExecutor::from_config(provider.clone(), &config.chat)),
        defaults: config.chat.generation(),
        api_tx,
    };
    let manager = Manager::new(
        api_rx,
        provider,
        ConfigLoader::with_dir(loader.config_dir()),
        config,
    );
    let manager_handle = tokio::spawn(manager.run());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            let _ = shutdown_tx.send(());
        }
    });

    println!("{}", style("Starting parley server...").bold().cyan());
    println!("Provider: {} (model {})", target.provider, target.model);
    println!("Listening on http://{}", addr);

    run_server(state, addr, shutdown_rx).await?;

    // The router held the last command sender, so the manager loop ends here
    let _ = manager_handle.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_reports_configuration_error() {
        let provider = Unconfigured {
            reason: "OpenAI API key is not set".to_string(),
            model: "gpt-4o-mini".to_string(),
        };
        let err = provider
            .chat(
                vec![Message::user("hi")],
                None,
                &GenerationParameters::default(),
                None,
            )
            .await
            .unwrap_err();

        assert!(err.is_config());
        assert_eq!(provider.get_default_model(), "gpt-4o-mini");
    }
}
