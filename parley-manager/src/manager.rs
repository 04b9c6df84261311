use parley_core::config::{Config, ConfigLoader};
use parley_providers::{build_provider, DynamicProvider, ProviderRegistry, ProviderTarget};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::state::{ConfigResponse, ConfigUpdate, ManagerCommand};

/// Owns the configuration and serializes every change to it.
///
/// Chat requests never pass through here; they only see the provider
/// through the shared [`DynamicProvider`].
pub struct Manager {
    api_rx: mpsc::Receiver<ManagerCommand>,
    provider: Arc<DynamicProvider>,
    loader: ConfigLoader,
    config: Config,
}

impl Manager {
    pub fn new(
        api_rx: mpsc::Receiver<ManagerCommand>,
        provider: Arc<DynamicProvider>,
        loader: ConfigLoader,
        config: Config,
    ) -> Self {
        Self {
            api_rx,
            provider,
            loader,
            config,
        }
    }

    /// Process commands until every sender is dropped
    pub async fn run(mut self) {
        info!("Manager loop started");
        while let Some(cmd) = self.api_rx.recv().await {
            match cmd {
                ManagerCommand::GetConfig(reply) => {
                    debug!("Processing GetConfig request");
                    let _ = reply.send(self.snapshot());
                }
                ManagerCommand::UpdateConfig(update, reply) => {
                    info!("Processing UpdateConfig request");
                    let result = self.apply(update).map(|_| self.snapshot());
                    if let Err(e) = &result {
                        error!("Config update rejected: {}", e);
                    }
                    let _ = reply.send(result);
                }
            }
        }
        info!("Manager loop stopped");
    }

    fn snapshot(&self) -> ConfigResponse {
        let chat = &self.config.chat;
        let provider = self.config.providers.get(&chat.provider);
        ConfigResponse {
            provider: chat.provider.clone(),
            model: chat.model.clone(),
            api_base: provider.and_then(|p| p.api_base.clone()),
            has_api_key: provider.is_some_and(|p| !p.api_key.trim().is_empty()),
        }
    }

    /// Build the new provider first; nothing is saved or swapped unless
    /// the build succeeds.
    fn apply(&mut self, update: ConfigUpdate) -> Result<(), String> {
        let registry = ProviderRegistry::new();
        let mut config = self.config.clone();

        let provider_changed = update
            .provider
            .as_ref()
            .is_some_and(|p| *p != config.chat.provider);
        let default_provider = update
            .provider
            .clone()
            .unwrap_or_else(|| config.chat.provider.clone());
        let model = match (&update.model, provider_changed) {
            (Some(model), _) => model.clone(),
            // The old model most likely does not exist on the new provider
            (None, true) => String::new(),
            (None, false) => config.chat.model.clone(),
        };

        let mut target = ProviderTarget::resolve(&registry, &default_provider, &model);
        let spec = registry
            .find_by_name(&target.provider)
            .ok_or_else(|| format!("Unknown provider: {}", target.provider))?;
        if target.model.trim().is_empty() {
            target.model = spec.default_model.clone();
        }

        let api_base = update.api_base.map(|b| Some(b).filter(|b| !b.trim().is_empty()));
        if update.api_key.is_some() {
            info!("Updating API key for provider: {}", target.provider);
        }
        if api_base.is_some() {
            info!("Updating API base for provider: {}", target.provider);
        }
        apply_update(&mut config, &target, &update.api_key, &api_base);

        let client = build_provider(&config.providers, &target).map_err(|e| e.to_string())?;

        // Only the file layer is written back; env-supplied keys stay in memory
        let mut stored = self
            .loader
            .load_stored()
            .map_err(|e| format!("Failed to read stored config: {}", e))?;
        apply_update(&mut stored, &target, &update.api_key, &api_base);
        self.loader.save(&stored).map_err(|e| {
            format!(
                "Failed to save config to {}: {}",
                self.loader.config_path().display(),
                e
            )
        })?;
        info!("Configuration saved to disk");

        self.provider.update(client);
        info!(
            "Provider switched to {} (model {})",
            target.provider, target.model
        );
        self.config = config;
        Ok(())
    }
}

/// Point `config` at `target` and set any credentials the update carried.
/// `api_base: Some(None)` clears the stored base.
fn apply_update(
    config: &mut Config,
    target: &ProviderTarget,
    api_key: &Option<String>,
    api_base: &Option<Option<String>>,
) {
    config.chat.provider = target.provider.clone();
    config.chat.model = target.model.clone();
    if let Some(section) = config.providers.get_mut(&target.provider) {
        if let Some(key) = api_key {
            section.api_key = key.clone();
        }
        if let Some(base) = api_base {
            section.api_base = base.clone();
        }
    }
}
