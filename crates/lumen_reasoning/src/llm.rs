use crate::api_types::Message;
use anyhow::Result;
use async_trait::async_trait;
use lumen_core::config::LlmConfig;
use lumen_core::Tool;

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    /// Maximum tokens to generate (will be clamped to provider limits)
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

impl From<&LlmConfig> for CompletionParams {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Chat-completion model. Holds no conversation state.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Completion where the model may answer with text, tool calls, or both.
    /// Returns an assistant message.
    async fn complete_with_tools(
        &self,
        system: &str,
        messages: Vec<Message>,
        tools: Vec<Tool>,
        params: CompletionParams,
    ) -> Result<Message>;

    /// Plain text completion without tool definitions.
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<String> {
        let reply = self.complete_with_tools(system, messages, Vec::new(), params).await?;
        Ok(reply.content().to_string())
    }
}
