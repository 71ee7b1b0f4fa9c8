pub mod agent_loop;
pub mod analytics;
pub mod api_types;
pub mod engine;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod state;
pub mod tool_registry;
pub mod tools;

pub use agent_loop::{AgentSettings, Orchestrator, ReasoningError};
pub use engine::{QueryOutcome, RagEngine};
pub use state::ConversationState;
pub use tool_registry::ToolRegistry;
