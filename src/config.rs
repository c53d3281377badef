use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{DeskPilotError, DeskPilotResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub screen: ScreenConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub providers: HashMap<String, ProviderEntry>,
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub display_name: String,
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`.
    pub api_base: String,
    /// Default model for this provider (used when the role does not name one).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Optional API key stored in config.toml (overridden by env var DESKPILOT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps the two agent roles to provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Vision model that picks the next action.
    pub reasoning: Option<RoleEntry>,
    /// Localization model that turns element descriptions into coordinates.
    pub grounding: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API. Falls back to the provider default.
    pub model: Option<String>,
    #[serde(default)]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f64 {
    0.1
}

/// Real screen dimensions in pixels; grounding output is scaled onto these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_iteration_delay_ms")]
    pub iteration_delay_ms: u64,
    #[serde(default = "default_key_delay_ms")]
    pub key_delay_ms: u64,
    #[serde(default = "default_click_type_delay_ms")]
    pub click_type_delay_ms: u64,
    #[serde(default = "default_scroll_tick_delay_ms")]
    pub scroll_tick_delay_ms: u64,
    #[serde(default = "default_scroll_clicks")]
    pub scroll_clicks: u32,
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,
    #[serde(default = "default_accept_token")]
    pub accept_token: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            iteration_delay_ms: default_iteration_delay_ms(),
            key_delay_ms: default_key_delay_ms(),
            click_type_delay_ms: default_click_type_delay_ms(),
            scroll_tick_delay_ms: default_scroll_tick_delay_ms(),
            scroll_clicks: default_scroll_clicks(),
            runs_dir: default_runs_dir(),
            accept_token: default_accept_token(),
        }
    }
}

fn default_max_steps() -> u32 {
    50
}

fn default_iteration_delay_ms() -> u64 {
    7000
}

fn default_key_delay_ms() -> u64 {
    250
}

fn default_click_type_delay_ms() -> u64 {
    500
}

fn default_scroll_tick_delay_ms() -> u64 {
    100
}

fn default_scroll_clicks() -> u32 {
    2
}

fn default_runs_dir() -> PathBuf {
    PathBuf::from("past_runs")
}

fn default_accept_token() -> String {
    "a".into()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputBackend {
    #[default]
    Enigo,
    Xdotool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InputConfig {
    #[serde(default)]
    pub backend: InputBackend,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureBackend {
    #[default]
    Xcap,
    Scrot,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureConfig {
    #[serde(default)]
    pub backend: CaptureBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// System prompt template containing the `TOOLS_INSERTED_HERE` placeholder.
    pub system_template: PathBuf,
    /// Directory of `*.json` tool descriptions spliced into the template.
    pub tools_dir: PathBuf,
    /// Safety notice shown before the run starts.
    pub warning_file: PathBuf,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system_template: PathBuf::from("prompts/system.txt"),
            tools_dir: PathBuf::from("prompts/tools"),
            warning_file: PathBuf::from("prompts/warning.txt"),
        }
    }
}

impl AppConfig {
    fn validate(&self) -> DeskPilotResult<()> {
        if self.screen.width == 0 || self.screen.height == 0 {
            return Err(DeskPilotError::Config(format!(
                "screen size must be non-zero, got {}x{}",
                self.screen.width, self.screen.height
            )));
        }
        for (role, entry) in [
            ("reasoning", &self.llm.roles.reasoning),
            ("grounding", &self.llm.roles.grounding),
        ] {
            let Some(entry) = entry else {
                return Err(DeskPilotError::Config(format!(
                    "[llm.roles.{role}] is required"
                )));
            };
            if !self.llm.providers.contains_key(&entry.provider) {
                return Err(DeskPilotError::Config(format!(
                    "role '{role}' references unknown provider '{}'",
                    entry.provider
                )));
            }
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> DeskPilotResult<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(DeskPilotError::Config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("deskpilot").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config directory");
            return Ok(candidate);
        }
    }

    Err(DeskPilotError::Config(
        "config.toml not found next to executable, in working directory or user config directory"
            .into(),
    ))
}

pub fn parse_config(content: &str) -> DeskPilotResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(explicit: Option<&Path>) -> DeskPilotResult<AppConfig> {
    let path = resolve_config_path(explicit)?;
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        screen = %format!("{}x{}", config.screen.width, config.screen.height),
        max_steps = config.agent.max_steps,
        "config loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[llm.providers.together]
api_base = "https://api.together.xyz/v1"
model = "meta-llama/Llama-4-Maverick-17B-128E-Instruct-FP8"

[llm.providers.runpod]
api_base = "https://api.runpod.ai/v2/endpoint/openai/v1"
model = "bytedance-research/UI-TARS-7B-DPO"
temperature = 0.0

[llm.roles.reasoning]
provider = "together"
temperature = 0.2
max_tokens = 8192

[llm.roles.grounding]
provider = "runpod"

[screen]
width = 1920
height = 1080
"#;

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.agent.max_steps, 50);
        assert_eq!(cfg.agent.iteration_delay_ms, 7000);
        assert_eq!(cfg.agent.scroll_clicks, 2);
        assert_eq!(cfg.agent.accept_token, "a");
        assert_eq!(cfg.input.backend, InputBackend::Enigo);
        assert_eq!(cfg.capture.backend, CaptureBackend::Xcap);
        assert_eq!(cfg.prompts.tools_dir, PathBuf::from("prompts/tools"));
        assert_eq!(cfg.llm.providers["runpod"].temperature, 0.0);
        assert_eq!(cfg.llm.providers["together"].temperature, 0.1);
    }

    #[test]
    fn backends_parse_snake_case() {
        let content = format!("{SAMPLE}\n[input]\nbackend = \"xdotool\"\n\n[capture]\nbackend = \"scrot\"\n");
        let cfg = parse_config(&content).unwrap();
        assert_eq!(cfg.input.backend, InputBackend::Xdotool);
        assert_eq!(cfg.capture.backend, CaptureBackend::Scrot);
    }

    #[test]
    fn role_with_unknown_provider_is_rejected() {
        let content = SAMPLE.replace("provider = \"runpod\"", "provider = \"missing\"");
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn zero_screen_is_rejected() {
        let content = SAMPLE.replace("width = 1920", "width = 0");
        assert!(matches!(parse_config(&content), Err(DeskPilotError::Config(_))));
    }
}
