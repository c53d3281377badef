use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{AppConfig, LlmConfig, RoleEntry};
use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// The two model roles the agent drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reasoning,
    Grounding,
}

impl Role {
    fn default_max_tokens(self) -> u32 {
        match self {
            Role::Reasoning => 8192,
            Role::Grounding => 2048,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reasoning => f.write_str("reasoning"),
            Role::Grounding => f.write_str("grounding"),
        }
    }
}

/// Registry of all configured LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn new(llm_config: LlmConfig) -> Self {
        Self {
            providers: HashMap::new(),
            llm_config,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    fn role_entry(&self, role: Role) -> Option<&RoleEntry> {
        match role {
            Role::Reasoning => self.llm_config.roles.reasoning.as_ref(),
            Role::Grounding => self.llm_config.roles.grounding.as_ref(),
        }
    }

    /// Return the provider and call configuration for an agent role.
    ///
    /// Model and temperature come from `[llm.roles.<role>]`, falling back to the
    /// provider entry's defaults.
    pub fn call_config_for_role(&self, role: Role) -> DeskPilotResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let entry = self
            .role_entry(role)
            .ok_or_else(|| DeskPilotError::Config(format!("no [llm.roles.{role}] configured")))?;

        let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
            DeskPilotError::Config(format!(
                "Role '{}' references unknown provider '{}'",
                role, entry.provider
            ))
        })?;

        let provider_entry = self.llm_config.providers.get(&entry.provider);
        let model = entry
            .model
            .clone()
            .or_else(|| provider_entry.map(|p| p.model.clone()))
            .unwrap_or_default();
        let temperature = entry
            .temperature
            .unwrap_or_else(|| provider_entry.map(|p| p.temperature).unwrap_or(0.1));

        let cfg = CallConfig {
            model,
            stream: entry.stream,
            temperature,
            max_tokens: Some(entry.max_tokens.unwrap_or(role.default_max_tokens())),
        };
        tracing::debug!(
            role = %role,
            provider = %entry.provider,
            model = %cfg.model,
            stream = cfg.stream,
            temperature = cfg.temperature,
            "resolved role config"
        );
        Ok((provider, cfg))
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `DESKPILOT_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new(config.llm.clone());
        for (id, entry) in &config.llm.providers {
            let env_key = format!("DESKPILOT_{}_API_KEY", id.to_uppercase());
            let api_key = std::env::var(&env_key)
                .ok()
                .or_else(|| entry.api_key.clone())
                .unwrap_or_default();
            if api_key.is_empty() {
                tracing::warn!(provider = %id, env = %env_key, "no API key configured");
            }
            registry.register(Arc::new(OpenAiCompatibleProvider::new(
                id.clone(),
                &entry.api_base,
                api_key,
            )));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const SAMPLE: &str = r#"
[llm.providers.together]
api_base = "https://api.together.xyz/v1"
model = "llama-4"
temperature = 0.3

[llm.providers.runpod]
api_base = "https://example.invalid/v1"
model = "ui-tars"

[llm.roles.reasoning]
provider = "together"
stream = true

[llm.roles.grounding]
provider = "runpod"
model = "ui-tars-72b"
temperature = 0.0
max_tokens = 64

[screen]
width = 1920
height = 1080
"#;

    #[test]
    fn role_falls_back_to_provider_defaults() {
        let cfg = parse_config(SAMPLE).unwrap();
        let registry = ProviderRegistry::from_config(&cfg);
        let (provider, call) = registry.call_config_for_role(Role::Reasoning).unwrap();
        assert_eq!(provider.name(), "together");
        assert_eq!(call.model, "llama-4");
        assert_eq!(call.temperature, 0.3);
        assert!(call.stream);
        assert_eq!(call.max_tokens, Some(8192));
    }

    #[test]
    fn role_overrides_take_precedence() {
        let cfg = parse_config(SAMPLE).unwrap();
        let registry = ProviderRegistry::from_config(&cfg);
        let (provider, call) = registry.call_config_for_role(Role::Grounding).unwrap();
        assert_eq!(provider.name(), "runpod");
        assert_eq!(call.model, "ui-tars-72b");
        assert_eq!(call.temperature, 0.0);
        assert!(!call.stream);
        assert_eq!(call.max_tokens, Some(64));
    }

    #[test]
    fn missing_role_is_config_error() {
        let registry = ProviderRegistry::new(LlmConfig::default());
        assert!(matches!(
            registry.call_config_for_role(Role::Grounding),
            Err(DeskPilotError::Config(_))
        ));
    }
}
