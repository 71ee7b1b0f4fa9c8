use crate::api_types::Role;
use crate::state::ConversationState;
use lumen_core::AnalyticsSummary;

/// Summary statistics for a completed conversation. Pure; calling it twice
/// on the same state gives the same result.
pub fn summarize(state: &ConversationState) -> AnalyticsSummary {
    let total_tool_calls = state
        .messages()
        .iter()
        .filter(|m| m.role() == Role::Assistant)
        .map(|m| m.tool_calls().len())
        .sum();

    AnalyticsSummary {
        total_tool_calls,
        distinct_tools: state.tools_used().to_vec(),
        reasoning_steps: state.messages().len() / 2,
    }
}
