use async_trait::async_trait;

use crate::errors::DeskPilotResult;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

/// Unified chat-completion provider. Both agent roles talk through this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider's identifier (matches the config.toml key).
    fn name(&self) -> &str;

    /// Sends one chat completion and returns the full reply text.
    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> DeskPilotResult<LlmResponse>;
}
