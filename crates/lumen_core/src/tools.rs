//! Tool abstraction types, shared between the reasoning loop and the
//! adapters that back each tool.
//!
//! The set of tools is closed: every handler belongs to exactly one
//! [`ToolKind`], and the registry refuses anything else at startup.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON tool definition sent to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// JSON Schema for tool input parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: Value,
    pub required: Vec<String>,
}

impl ToolInputSchema {
    pub fn object(properties: Value, required: &[&str]) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties,
            required: required.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// The closed set of capabilities the reasoning loop may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    KnowledgeBase,
    WebSearch,
    SqlQuery,
}

impl ToolKind {
    /// Every kind, in the order tools are presented to the model.
    pub const ALL: [ToolKind; 3] = [ToolKind::KnowledgeBase, ToolKind::WebSearch, ToolKind::SqlQuery];

    /// Wire name shared by the model adapter and the registry.
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::KnowledgeBase => "search_knowledge_base",
            ToolKind::WebSearch => "search_web",
            ToolKind::SqlQuery => "sql_query_generator",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification of tool execution errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolErrorKind {
    /// Transient: timeout, connection reset. Worth retrying.
    Transient,
    /// Permanent: missing param, unknown tool, policy violation. Retrying will not help.
    Permanent,
}

/// Structured result from a tool execution.
///
/// Failures are values, not errors: `content` carries the error text the
/// model will read on its next turn.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
    pub error_kind: Option<ToolErrorKind>,
    /// Document identifiers the result was derived from.
    pub sources: Vec<String>,
}

impl ToolOutcome {
    pub fn ok(content: String) -> Self {
        Self { content, is_error: false, error_kind: None, sources: Vec::new() }
    }

    pub fn transient_error(msg: String) -> Self {
        Self { content: msg, is_error: true, error_kind: Some(ToolErrorKind::Transient), sources: Vec::new() }
    }

    pub fn permanent_error(msg: String) -> Self {
        Self { content: msg, is_error: true, error_kind: Some(ToolErrorKind::Permanent), sources: Vec::new() }
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }
}

/// Trait for tool handlers that can be registered and dispatched.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// Which member of the closed tool set this handler implements.
    fn kind(&self) -> ToolKind;
    /// Unique name used for dispatch (must match the tool name in schema).
    fn name(&self) -> &str {
        self.kind().name()
    }
    /// Human-readable description for logging.
    fn description(&self) -> &str;
    /// JSON schema sent to the LLM so it knows how to call this tool.
    fn schema(&self) -> Tool;
    /// Execute the tool with the given JSON input. Must not panic or propagate
    /// failures: every error is folded into the returned outcome.
    async fn execute(&self, input: &Value) -> ToolOutcome;
}

/// Pull a required string argument out of a tool input object.
pub fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, ToolOutcome> {
    match input.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ToolOutcome::permanent_error(format!(
            "Missing required parameter: \"{key}\""
        ))),
    }
}
