//! Per-query conversation state. Append-only: the transcript and its
//! bookkeeping only grow, and only through the two transition methods.

use crate::api_types::{Message, Role, ToolCall};
use lumen_core::ToolOutcome;

#[derive(Debug, Clone)]
pub struct ConversationState {
    system: String,
    messages: Vec<Message>,
    tool_calls_made: usize,
    /// Distinct tool names, first-seen order.
    tools_used: Vec<String>,
    /// Distinct source document ids, first-seen order.
    sources: Vec<String>,
}

impl ConversationState {
    /// Seed a conversation with the system instruction and the user's query.
    pub fn new(system: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![Message::user(query)],
            tool_calls_made: 0,
            tools_used: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// AgentTurn result.
    pub fn push_assistant(&mut self, message: Message) {
        debug_assert_eq!(message.role(), Role::Assistant);
        self.messages.push(message);
    }

    /// ToolTurn result: one tool message per call, in call order.
    pub fn push_tool_results(&mut self, calls: &[ToolCall], outcomes: Vec<ToolOutcome>) {
        debug_assert_eq!(calls.len(), outcomes.len());
        for (call, outcome) in calls.iter().zip(outcomes) {
            self.tool_calls_made += 1;
            if !self.tools_used.iter().any(|t| t == &call.name) {
                self.tools_used.push(call.name.clone());
            }
            for source in outcome.sources {
                if !self.sources.contains(&source) {
                    self.sources.push(source);
                }
            }
            self.messages.push(Message::tool_result(call.id.clone(), outcome.content));
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Tool calls requested by the latest assistant message, if it is the
    /// latest message.
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match self.last_message() {
            Some(m) if m.role() == Role::Assistant => m.tool_calls(),
            _ => &[],
        }
    }

    /// The loop is done once the latest message is an assistant message
    /// without tool calls.
    pub fn is_done(&self) -> bool {
        matches!(self.last_message(), Some(m) if m.role() == Role::Assistant && m.tool_calls().is_empty())
    }

    /// Final answer text, once done.
    pub fn answer(&self) -> Option<&str> {
        if self.is_done() {
            self.last_message().map(|m| m.content())
        } else {
            None
        }
    }

    pub fn tool_calls_made(&self) -> usize {
        self.tool_calls_made
    }

    pub fn tools_used(&self) -> &[String] {
        &self.tools_used
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seeded_state() {
        let state = ConversationState::new("sys", "hello");
        assert_eq!(state.system(), "sys");
        assert_eq!(state.messages().len(), 1);
        assert!(!state.is_done());
        assert!(state.pending_tool_calls().is_empty());
        assert!(state.answer().is_none());
    }

    #[test]
    fn test_tool_turn_updates_bookkeeping() {
        let mut state = ConversationState::new("sys", "q");
        let calls = vec![
            ToolCall::new("a", "search_knowledge_base", json!({"query": "x"})),
            ToolCall::new("b", "search_web", json!({"query": "x"})),
            ToolCall::new("c", "search_knowledge_base", json!({"query": "y"})),
        ];
        state.push_assistant(Message::assistant("", calls.clone()));
        assert_eq!(state.pending_tool_calls().len(), 3);

        state.push_tool_results(
            &calls,
            vec![
                ToolOutcome::ok("kb1".into()).with_sources(vec!["doc-1".into()]),
                ToolOutcome::transient_error("Error searching the web: down".into()),
                ToolOutcome::ok("kb2".into()).with_sources(vec!["doc-2".into(), "doc-1".into()]),
            ],
        );

        assert_eq!(state.tool_calls_made(), 3);
        assert_eq!(state.tools_used(), &["search_knowledge_base".to_string(), "search_web".to_string()]);
        assert_eq!(state.sources(), &["doc-1".to_string(), "doc-2".to_string()]);
        let ids: Vec<_> = state.messages()[2..].iter().map(|m| m.tool_call_id().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(state.pending_tool_calls().is_empty());
        assert!(!state.is_done());

        state.push_assistant(Message::assistant("done", vec![]));
        assert!(state.is_done());
        assert_eq!(state.answer(), Some("done"));
    }
}
