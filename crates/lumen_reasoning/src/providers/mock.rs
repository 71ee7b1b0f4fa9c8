//! Mock LLM provider: deterministic responses for running without API keys.

use crate::api_types::Message;
use crate::llm::{CompletionParams, LlmClient};
use anyhow::Result;
use lumen_core::Tool;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Replays scripted assistant messages in order, then falls back to a fixed
/// text answer that echoes the model name.
#[derive(Debug)]
pub struct MockProvider {
    model: String,
    script: Mutex<VecDeque<Message>>,
}

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn scripted(model: &str, replies: Vec<Message>) -> Self {
        Self {
            model: model.to_string(),
            script: Mutex::new(replies.into()),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for MockProvider {
    async fn complete_with_tools(
        &self,
        _system: &str,
        _messages: Vec<Message>,
        _tools: Vec<Tool>,
        _params: CompletionParams,
    ) -> Result<Message> {
        if let Some(next) = self.script.lock().await.pop_front() {
            return Ok(next);
        }
        Ok(Message::assistant(
            format!("(Mock {} Response) I received your prompt.", self.model),
            Vec::new(),
        ))
    }
}
