//! The reasoning loop: alternate AgentTurn (ask the model) and ToolTurn (run
//! the tools it asked for) until the model answers without tool calls.

use crate::api_types::{Message, Role, ToolCall};
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::agent_system_prompt;
use crate::state::ConversationState;
use crate::tool_registry::{RegistryError, ToolRegistry};
use futures_util::future::join_all;
use lumen_core::config::{AgentConfig, LlmConfig};
use lumen_core::ToolOutcome;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("model call failed: {0:#}")]
    Model(anyhow::Error),
    #[error("model did not respond within {0}s")]
    ModelTimeout(u64),
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
    #[error("model was still requesting tools after {turns} turns")]
    MaxTurnsExceeded { turns: usize },
    #[error("tool set misconfigured: {0}")]
    ToolSet(#[from] RegistryError),
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Hard cap on AgentTurns per query.
    pub max_turns: usize,
    pub tool_timeout: Duration,
    pub llm_timeout: Duration,
    pub params: CompletionParams,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: 10,
            tool_timeout: Duration::from_secs(60),
            llm_timeout: Duration::from_secs(120),
            params: CompletionParams::default(),
        }
    }
}

impl AgentSettings {
    pub fn from_config(agent: &AgentConfig, llm: &LlmConfig) -> Self {
        Self {
            max_turns: agent.max_turns.max(1),
            tool_timeout: agent.tool_timeout(),
            llm_timeout: agent.llm_timeout(),
            params: CompletionParams::from(llm),
        }
    }
}

pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    settings: AgentSettings,
    system_prompt: String,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, registry: ToolRegistry, settings: AgentSettings) -> Self {
        let system_prompt = agent_system_prompt(&registry.available_tools());
        Self {
            llm,
            registry,
            settings,
            system_prompt,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Drive one query to completion. The returned state is done: its last
    /// message is the answer.
    #[tracing::instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn run(&self, query: &str) -> Result<ConversationState, ReasoningError> {
        let mut state = ConversationState::new(self.system_prompt.clone(), query);
        let tools = self.registry.available_tools();

        for turn in 1..=self.settings.max_turns {
            // AgentTurn
            let reply = self.agent_turn(&state, tools.clone()).await?;
            validate_reply(&reply)?;
            let calls = reply.tool_calls().to_vec();
            state.push_assistant(reply);

            if calls.is_empty() {
                tracing::info!("Agent finished after {} turn(s), {} tool call(s)", turn, state.tool_calls_made());
                return Ok(state);
            }

            // ToolTurn
            tracing::info!("Turn {}: {} tool call(s)", turn, calls.len());
            let outcomes = self.tool_turn(&calls).await;
            state.push_tool_results(&calls, outcomes);
        }

        tracing::warn!("Agent hit the {} turn limit", self.settings.max_turns);
        Err(ReasoningError::MaxTurnsExceeded {
            turns: self.settings.max_turns,
        })
    }

    async fn agent_turn(
        &self,
        state: &ConversationState,
        tools: Vec<lumen_core::Tool>,
    ) -> Result<Message, ReasoningError> {
        let call = self.llm.complete_with_tools(
            state.system(),
            state.messages().to_vec(),
            tools,
            self.settings.params.clone(),
        );
        match tokio::time::timeout(self.settings.llm_timeout, call).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                tracing::error!("Model call failed: {:#}", e);
                Err(ReasoningError::Model(e))
            }
            Err(_) => {
                tracing::error!("Model call timed out after {}s", self.settings.llm_timeout.as_secs());
                Err(ReasoningError::ModelTimeout(self.settings.llm_timeout.as_secs()))
            }
        }
    }

    /// Run sibling calls concurrently; outcomes come back in call order.
    async fn tool_turn(&self, calls: &[ToolCall]) -> Vec<ToolOutcome> {
        join_all(calls.iter().map(|call| self.run_tool(call))).await
    }

    async fn run_tool(&self, call: &ToolCall) -> ToolOutcome {
        tracing::debug!("Tool {} ({}) input: {}", call.name, call.id, call.input);
        let timeout = self.settings.tool_timeout;
        match tokio::time::timeout(timeout, self.registry.dispatch(&call.name, &call.input)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!("Tool '{}' timed out after {}s", call.name, timeout.as_secs());
                ToolOutcome::transient_error(format!(
                    "Tool '{}' timed out after {}s",
                    call.name,
                    timeout.as_secs()
                ))
            }
        }
    }
}

fn validate_reply(reply: &Message) -> Result<(), ReasoningError> {
    if reply.role() != Role::Assistant {
        return Err(ReasoningError::MalformedResponse(format!(
            "expected an assistant message, got {:?}",
            reply.role()
        )));
    }
    let mut seen = HashSet::new();
    for call in reply.tool_calls() {
        if call.id.is_empty() {
            return Err(ReasoningError::MalformedResponse(format!(
                "tool call '{}' has no id",
                call.name
            )));
        }
        if !seen.insert(call.id.as_str()) {
            return Err(ReasoningError::MalformedResponse(format!(
                "duplicate tool call id '{}'",
                call.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;
    use lumen_core::{Tool, ToolHandler, ToolInputSchema, ToolKind};
    use serde_json::{json, Value};

    struct SlowSearch;

    #[async_trait::async_trait]
    impl ToolHandler for SlowSearch {
        fn kind(&self) -> ToolKind {
            ToolKind::WebSearch
        }
        fn description(&self) -> &str {
            "slow"
        }
        fn schema(&self) -> Tool {
            Tool {
                name: self.name().into(),
                description: "slow".into(),
                input_schema: ToolInputSchema::object(json!({}), &[]),
            }
        }
        async fn execute(&self, _input: &Value) -> ToolOutcome {
            tokio::time::sleep(Duration::from_secs(600)).await;
            ToolOutcome::ok("late".into())
        }
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall::new(id, name, json!({"query": "q"}))
    }

    #[test]
    fn test_validate_reply() {
        assert!(validate_reply(&Message::assistant("hi", vec![])).is_ok());
        assert!(validate_reply(&Message::assistant("", vec![call("a", "x"), call("b", "y")])).is_ok());
        assert!(matches!(
            validate_reply(&Message::assistant("", vec![call("", "x")])),
            Err(ReasoningError::MalformedResponse(_))
        ));
        assert!(matches!(
            validate_reply(&Message::assistant("", vec![call("a", "x"), call("a", "y")])),
            Err(ReasoningError::MalformedResponse(_))
        ));
        assert!(validate_reply(&Message::user("hi")).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout_becomes_error_result() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(SlowSearch)).unwrap();
        let llm = MockProvider::scripted(
            "m",
            vec![
                Message::assistant("", vec![call("c1", "search_web")]),
                Message::assistant("The search timed out.", vec![]),
            ],
        );
        let settings = AgentSettings {
            tool_timeout: Duration::from_secs(5),
            ..AgentSettings::default()
        };
        let orchestrator = Orchestrator::new(Arc::new(llm), registry, settings);

        let state = orchestrator.run("latest news").await.unwrap();
        assert_eq!(state.messages()[2].content(), "Tool 'search_web' timed out after 5s");
        assert_eq!(state.answer(), Some("The search timed out."));
    }

    #[tokio::test]
    async fn test_system_prompt_tracks_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(SlowSearch)).unwrap();
        let orchestrator = Orchestrator::new(Arc::new(MockProvider::new("m")), registry, AgentSettings::default());
        assert!(orchestrator.system_prompt().contains("search_web"));
        assert!(!orchestrator.system_prompt().contains("search_knowledge_base"));
    }
}
