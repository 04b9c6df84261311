//! CLI entry point for parley

mod batch;
mod chat;
mod client;
mod serve;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input, Select};
use dotenv::dotenv;
use parley_agent::TurnExecutor;
use parley_core::config::{Config, ConfigLoader};
use parley_core::logging::init_logging;
use parley_core::utils::expand_tilde;
use parley_core::{GenerationParameters, Session};
use parley_providers::{build_provider, ApiType, ProviderRegistry, ProviderTarget};
use tracing::{error, info, warn};

use crate::chat::{Backend, ChatRepl};
use crate::client::ApiClient;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Turn-based chat against local and hosted language models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize parley configuration
    Onboard,
    /// Interactive chat in the terminal
    Chat {
        /// Sampling temperature (0.0 to 2.0)
        #[arg(short, long)]
        temperature: Option<f64>,
        /// Top-k cutoff (0 to 100)
        #[arg(long)]
        top_k: Option<u32>,
        /// Nucleus sampling mass (0.0 to 1.0)
        #[arg(long)]
        top_p: Option<f64>,
        /// Model to use, optionally prefixed with a provider (`azure/gpt-4`)
        #[arg(short, long)]
        model: Option<String>,
        /// Provider to use
        #[arg(short, long)]
        provider: Option<String>,
        /// Run turns on a `parley serve` instance at this URL
        #[arg(long, conflicts_with_all = ["model", "provider"])]
        remote: Option<String>,
    },
    /// Send a single message without conversation history
    Ask {
        /// Message to send
        #[arg(short = 'M', long)]
        message: String,
        /// Sampling temperature, 0.0 when not given
        #[arg(short, long)]
        temperature: Option<f64>,
        /// Model to use
        #[arg(short, long)]
        model: Option<String>,
        /// Provider to use
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// One-shot call for evaluation harnesses
    Batch {
        /// Prompt text
        prompt: String,
        /// Harness options as JSON
        options: String,
        /// Harness context as JSON
        context: String,
    },
    /// Run the HTTP chat server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show status information
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config_loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(expand_tilde(dir)),
        None => ConfigLoader::new(),
    };

    if let Commands::Onboard = cli.command {
        return run_onboard(&config_loader);
    }

    let config = config_loader.load().with_context(|| {
        format!(
            "Failed to load configuration from {}",
            config_loader.config_path().display()
        )
    })?;
    let _log_guard = init_logging(&config.logging);

    match cli.command {
        // Runs before the config is loaded so a broken file can be replaced
        Commands::Onboard => {}
        Commands::Chat {
            temperature,
            top_k,
            top_p,
            model,
            provider,
            remote,
        } => {
            let params = GenerationParameters {
                temperature: temperature.unwrap_or(config.chat.temperature),
                top_k: top_k.or(config.chat.top_k),
                top_p: top_p.or(config.chat.top_p),
            };
            info!("Starting chat");
            run_chat(&config, params, model, provider, remote).await?;
        }
        Commands::Ask {
            message,
            temperature,
            model,
            provider,
        } => {
            let params = GenerationParameters {
                temperature: temperature.unwrap_or(0.0),
                top_k: config.chat.top_k,
                top_p: config.chat.top_p,
            };
            run_ask(&config, &message, params, model, provider).await?;
        }
        Commands::Batch {
            prompt,
            options,
            context,
        } => {
            batch::run_batch(&config, &prompt, &options, &context).await?;
        }
        Commands::Serve { host, port } => {
            serve::run_serve(&config_loader, config, host, port).await?;
        }
        Commands::Status => {
            run_status(&config_loader, &config);
        }
    }

    Ok(())
}

/// Pick provider and model from flags, falling back to `config.chat`.
///
/// Switching provider without naming a model uses that provider's default.
fn select_target(config: &Config, provider: Option<String>, model: Option<String>) -> ProviderTarget {
    let registry = ProviderRegistry::new();
    let default_provider = provider
        .clone()
        .unwrap_or_else(|| config.chat.provider.clone());
    let model = match (model, provider) {
        (Some(model), _) => model,
        (None, Some(provider)) if provider != config.chat.provider => String::new(),
        (None, _) => config.chat.model.clone(),
    };
    ProviderTarget::resolve(&registry, &default_provider, &model)
}

/// Front-ends behave like sliders: out-of-range values are pulled into range
fn clamp_params(params: GenerationParameters) -> GenerationParameters {
    let clamped = params.clamped();
    if clamped != params {
        warn!("Generation parameters clamped: {:?} -> {:?}", params, clamped);
    }
    clamped
}

fn local_executor(
    config: &Config,
    provider: Option<String>,
    model: Option<String>,
) -> Result<(TurnExecutor, ProviderTarget)> {
    let target = select_target(config, provider, model);
    let provider = build_provider(&config.providers, &target)?;
    Ok((TurnExecutor::from_config(provider, &config.chat), target))
}

async fn run_chat(
    config: &Config,
    params: GenerationParameters,
    model: Option<String>,
    provider: Option<String>,
    remote: Option<String>,
) -> Result<()> {
    let params = clamp_params(params);

    let (backend, title) = match remote {
        Some(url) => {
            let title = format!("parley (remote: {})", url);
            (Backend::Remote(ApiClient::new(url)), title)
        }
        None => {
            let (executor, target) = local_executor(config, provider, model)?;
            let title = format!("parley ({} / {})", target.provider, executor.model());
            (Backend::Local(executor), title)
        }
    };

    ChatRepl::new(backend, params, title).run().await
}

async fn run_ask(
    config: &Config,
    message: &str,
    params: GenerationParameters,
    model: Option<String>,
    provider: Option<String>,
) -> Result<()> {
    let params = clamp_params(params);
    let (executor, _) = local_executor(config, provider, model)?;

    println!("{}", style("Processing...").cyan());
    match executor.execute_turn(message, &Session::new(), &params).await {
        Ok((reply, _)) => {
            println!("\n{}", style("Response:").bold());
            println!("{}", reply);
            Ok(())
        }
        Err(e) => {
            error!("Error processing message: {}", e);
            anyhow::bail!("Failed to process message: {}", e);
        }
    }
}

fn run_onboard(loader: &ConfigLoader) -> Result<()> {
    println!("{}", style("Welcome to parley!").bold().cyan());
    println!("Let's set up your configuration.\n");

    let config_path = loader.config_path();
    if config_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt("Configuration already exists. Overwrite?")
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Onboard cancelled.");
            return Ok(());
        }
    }

    let registry = ProviderRegistry::new();
    let labels: Vec<String> = registry.all().iter().map(|spec| spec.label()).collect();
    let provider_idx = Select::new()
        .with_prompt("Select your LLM provider")
        .items(&labels)
        .default(0)
        .interact()?;
    let spec = &registry.all()[provider_idx];

    let mut config = Config::default();
    let section = config
        .providers
        .get_mut(&spec.name)
        .with_context(|| format!("No configuration section for {}", spec.name))?;

    match spec.api_type {
        ApiType::Ollama => {
            let host: String = Input::new()
                .with_prompt("Ollama host")
                .default(spec.default_api_base.clone())
                .interact_text()?;
            section.api_base = Some(host);
        }
        ApiType::Azure => {
            let endpoint: String = Input::new()
                .with_prompt("Azure OpenAI endpoint (leave empty to use AZURE_OPENAI_ENDPOINT)")
                .allow_empty(true)
                .interact_text()?;
            section.api_base = Some(endpoint).filter(|e| !e.trim().is_empty());
            let deployment: String = Input::new()
                .with_prompt("Deployment name")
                .default(spec.default_model.clone())
                .interact_text()?;
            section.deployment = Some(deployment);
        }
        ApiType::Openai => {
            let api_base: String = Input::new()
                .with_prompt("API base")
                .default(spec.default_api_base.clone())
                .interact_text()?;
            section.api_base = Some(api_base);
        }
    }

    if spec.requires_api_key {
        let api_key: String = Input::new()
            .with_prompt(format!(
                "Enter your {} API key (leave empty to use {})",
                spec.label(),
                spec.env_key
            ))
            .allow_empty(true)
            .interact_text()?;
        section.api_key = api_key;
    }

    let model: String = Input::new()
        .with_prompt("Enter the model to use")
        .default(spec.default_model.clone())
        .interact_text()?;
    config.chat.provider = spec.name.clone();
    config.chat.model = model;

    loader.save(&config)?;

    println!(
        "\n{}",
        style("Configuration saved successfully!").green().bold()
    );
    println!("Config location: {}", config_path.display());
    println!("\nYou can now run:");
    println!("  {} - Chat in the terminal", style("parley chat").cyan());
    println!(
        "  {} - Send a single message",
        style("parley ask --message 'Hello!'").cyan()
    );
    println!("  {} - Start the HTTP server", style("parley serve").cyan());

    Ok(())
}

fn run_status(loader: &ConfigLoader, config: &Config) {
    println!("{}", style("parley status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config file: {}", loader.config_path().display());
    println!("  Provider: {}", config.chat.provider);
    println!("  Model: {}", config.chat.model);
    println!(
        "  History: {:?} (window {})",
        config.chat.history_policy, config.chat.history_window
    );
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Logs: {}", config.logging.dir);
    println!();

    println!("{}", style("Providers:").bold());
    let registry = ProviderRegistry::new();
    for spec in registry.all() {
        let Some(section) = config.providers.get(&spec.name) else {
            continue;
        };
        let ready = match spec.api_type {
            ApiType::Ollama => true,
            ApiType::Openai => !section.api_key.is_empty(),
            ApiType::Azure => !section.api_key.is_empty() && section.api_base.is_some(),
        };
        let status = if ready {
            style("configured").green()
        } else {
            style("not configured").red()
        };
        let active = if spec.name == config.chat.provider {
            " (active)"
        } else {
            ""
        };
        println!("  {}: {}{}", spec.label(), status, active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_target_defaults_to_chat_config() {
        let config = Config::default();
        let target = select_target(&config, None, None);
        assert_eq!(target.provider, "ollama");
        assert_eq!(target.model, "gemma:7b");
    }

    #[test]
    fn test_select_target_other_provider_drops_model() {
        let config = Config::default();
        let target = select_target(&config, Some("openai".to_string()), None);
        assert_eq!(target.provider, "openai");
        assert_eq!(target.model, "");
    }

    #[test]
    fn test_select_target_model_prefix() {
        let config = Config::default();
        let target = select_target(&config, None, Some("azure/gpt-4".to_string()));
        assert_eq!(target.provider, "azure");
        assert_eq!(target.model, "gpt-4");
    }

    #[test]
    fn test_clamp_params() {
        let params = clamp_params(GenerationParameters {
            temperature: 9.0,
            top_k: Some(500),
            top_p: Some(0.5),
        });
        assert_eq!(params.temperature, 2.0);
        assert_eq!(params.top_k, Some(100));
        assert_eq!(params.top_p, Some(0.5));
    }

    #[test]
    fn test_cli_parses_batch_positionals() {
        let cli = Cli::try_parse_from(["parley", "batch", "Whats 2 + 2?", "{}", "{\"vars\":{}}"])
            .unwrap();
        match cli.command {
            Commands::Batch {
                prompt,
                options,
                context,
            } => {
                assert_eq!(prompt, "Whats 2 + 2?");
                assert_eq!(options, "{}");
                assert_eq!(context, "{\"vars\":{}}");
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn test_cli_remote_conflicts_with_local_selection() {
        assert!(Cli::try_parse_from(["parley", "chat", "--remote", "http://h:7860"]).is_ok());
        assert!(
            Cli::try_parse_from(["parley", "chat", "--remote", "http://h:7860", "--model", "m"])
                .is_err()
        );
        assert!(Cli::try_parse_from([
            "parley",
            "chat",
            "--remote",
            "http://h:7860",
            "--provider",
            "openai"
        ])
        .is_err());
    }
}
