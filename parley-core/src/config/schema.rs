//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::generation::{GenerationParameters, DEFAULT_TEMPERATURE, DEFAULT_TOP_K, DEFAULT_TOP_P};

/// Root configuration for parley
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Interactive chat defaults
    #[serde(default)]
    pub chat: ChatConfig,
    /// Provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// HTTP chat surface configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Batch entry point configuration
    #[serde(default)]
    pub batch: BatchConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// How earlier turns are carried into the next provider request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Rebuild the prompt from the session on every call
    #[default]
    Replay,
    /// Send only the new user input
    Discard,
}

/// Defaults for interactive chat
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Provider name (ollama, azure, openai)
    pub provider: String,
    /// Model, or deployment for Azure
    pub model: String,
    pub temperature: f64,
    pub top_k: Option<u32>,
    pub top_p: Option<f64>,
    /// Completion token cap; unset leaves it to the provider
    pub max_tokens: Option<u32>,
    /// Optional system prompt prepended to every request
    pub system_prompt: Option<String>,
    pub history_policy: HistoryPolicy,
    /// Maximum number of earlier turns replayed
    pub history_window: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "gemma:7b".to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_k: Some(DEFAULT_TOP_K),
            top_p: Some(DEFAULT_TOP_P),
            max_tokens: None,
            system_prompt: None,
            history_policy: HistoryPolicy::Replay,
            history_window: 20,
        }
    }
}

impl ChatConfig {
    /// Default generation parameters for a turn
    pub fn generation(&self) -> GenerationParameters {
        GenerationParameters {
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_ollama")]
    pub ollama: ProviderConfig,
    #[serde(default = "default_azure")]
    pub azure: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
}

fn default_ollama() -> ProviderConfig {
    ProviderConfig {
        api_base: Some("http://localhost:11434".to_string()),
        ..Default::default()
    }
}

fn default_azure() -> ProviderConfig {
    ProviderConfig {
        api_version: Some("2023-05-15".to_string()),
        ..Default::default()
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ollama: default_ollama(),
            azure: default_azure(),
            openai: ProviderConfig::default(),
        }
    }
}

impl ProvidersConfig {
    /// Look up a provider's settings by its config key
    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "ollama" => Some(&self.ollama),
            "azure" => Some(&self.azure),
            "openai" => Some(&self.openai),
            _ => None,
        }
    }

    /// Mutable lookup by config key
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ProviderConfig> {
        match name {
            "ollama" => Some(&mut self.ollama),
            "azure" => Some(&mut self.azure),
            "openai" => Some(&mut self.openai),
            _ => None,
        }
    }
}

/// Provider connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    /// Base URL (endpoint for Azure)
    #[serde(default)]
    pub api_base: Option<String>,
    /// Azure deployment name
    #[serde(default)]
    pub deployment: Option<String>,
    /// Azure API version
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub extra_headers: Option<HashMap<String, String>>,
    /// Request timeout; unset keeps the HTTP client default
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// HTTP chat surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7860
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

pub const DEFAULT_BATCH_SYSTEM_PROMPT: &str = "Translate the math problem into a single \
expression that a calculator can evaluate. Reply with the expression in a fenced block and \
nothing else, for example:

```text
37593 * 67
```

Use numbers, + - * / % ^, parentheses, the functions sqrt, exp, ln, abs, floor, ceil, \
round, sin, cos and tan, and the constants pi and e. Do not compute the result yourself.";

/// Batch entry point configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Provider override; falls back to `chat.provider`
    pub provider: Option<String>,
    /// Model override; falls back to `chat.model`
    pub model: Option<String>,
    pub system_prompt: String,
    pub temperature: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            system_prompt: DEFAULT_BATCH_SYSTEM_PROMPT.to_string(),
            temperature: 0.0,
        }
    }
}
