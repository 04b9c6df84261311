//! Configuration validation rules.

use super::schema::Config;

const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "azure", "openai"];

/// Validate configuration and return aggregated validation errors.
///
/// Credentials are not checked here: a missing key only matters for the
/// provider actually selected, and that is reported when the provider is built.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if !KNOWN_PROVIDERS.contains(&config.chat.provider.as_str()) {
        errors.push(format!(
            "chat.provider must be one of {}, got '{}'",
            KNOWN_PROVIDERS.join(", "),
            config.chat.provider
        ));
    }
    if config.chat.model.trim().is_empty() {
        errors.push("chat.model must not be empty".to_string());
    }
    if !(0.0..=2.0).contains(&config.chat.temperature) {
        errors.push("chat.temperature must be in [0.0, 2.0]".to_string());
    }
    if let Some(top_p) = config.chat.top_p {
        if !(0.0..=1.0).contains(&top_p) {
            errors.push("chat.top_p must be in [0.0, 1.0]".to_string());
        }
    }
    if let Some(top_k) = config.chat.top_k {
        if top_k > crate::generation::TOP_K_MAX {
            errors.push("chat.top_k must be in [0, 100]".to_string());
        }
    }
    if config.chat.max_tokens == Some(0) {
        errors.push("chat.max_tokens must be > 0 when set".to_string());
    }

    if let Some(provider) = &config.batch.provider {
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            errors.push(format!("batch.provider '{}' is not a known provider", provider));
        }
    }
    if !(0.0..=2.0).contains(&config.batch.temperature) {
        errors.push("batch.temperature must be in [0.0, 2.0]".to_string());
    }

    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }
    if config.server.host.trim().is_empty() {
        errors.push("server.host must not be empty".to_string());
    }

    for (name, provider) in [
        ("ollama", &config.providers.ollama),
        ("azure", &config.providers.azure),
        ("openai", &config.providers.openai),
    ] {
        if provider.timeout_secs == Some(0) {
            errors.push(format!("providers.{}.timeout_secs must be > 0 when set", name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_config(&Config::default()).unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = Config::default();
        config.chat.provider = "bard".to_string();

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("chat.provider"));
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut config = Config::default();
        config.chat.temperature = 2.5;
        config.chat.top_p = Some(1.2);
        config.server.port = 0;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("chat.temperature"));
        assert!(message.contains("chat.top_p"));
        assert!(message.contains("server.port"));
    }
}
