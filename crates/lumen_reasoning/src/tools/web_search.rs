use lumen_core::tools::required_str;
use lumen_core::{Tool, ToolHandler, ToolInputSchema, ToolKind, ToolOutcome, WebSearch};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct WebSearchTool {
    provider: Arc<dyn WebSearch>,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn WebSearch>, max_results: usize) -> Self {
        Self { provider, max_results }
    }
}

#[async_trait::async_trait]
impl ToolHandler for WebSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WebSearch
    }

    fn description(&self) -> &str {
        "Search the web for current information, news, or facts not in the knowledge base. Use this \
         for recent events, real-time data, or when the knowledge base has no results."
    }

    fn schema(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: ToolInputSchema::object(
                json!({"query": {"type": "string", "description": "Search query"}}),
                &["query"],
            ),
        }
    }

    async fn execute(&self, input: &Value) -> ToolOutcome {
        let query = match required_str(input, "query") {
            Ok(q) => q,
            Err(outcome) => return outcome,
        };

        let hits = match self.provider.search(query, self.max_results).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("{} search failed: {:#}", self.provider.name(), e);
                return ToolOutcome::transient_error(format!("Error searching the web: {:#}", e));
            }
        };

        if hits.is_empty() {
            return ToolOutcome::ok("No web search results found.".to_string());
        }

        let formatted: Vec<String> = hits
            .iter()
            .map(|h| format!("Source: {}\nTitle: {}\nContent: {}\n", h.url, h.title, h.content))
            .collect();
        ToolOutcome::ok(format!("Web Search Results:\n{}", formatted.join("\n---\n")))
    }
}
