use lumen_core::tools::required_str;
use lumen_core::{KnowledgeBase, Tool, ToolHandler, ToolInputSchema, ToolKind, ToolOutcome};
use serde_json::{json, Value};
use std::sync::Arc;

const MAX_K: usize = 20;

pub struct KnowledgeBaseTool {
    knowledge_base: Arc<dyn KnowledgeBase>,
    default_k: usize,
}

impl KnowledgeBaseTool {
    pub fn new(knowledge_base: Arc<dyn KnowledgeBase>, default_k: usize) -> Self {
        Self {
            knowledge_base,
            default_k,
        }
    }
}

#[async_trait::async_trait]
impl ToolHandler for KnowledgeBaseTool {
    fn kind(&self) -> ToolKind {
        ToolKind::KnowledgeBase
    }

    fn description(&self) -> &str {
        "Search the internal knowledge base for relevant documents. Use this when the user asks \
         about uploaded documents or internal information."
    }

    fn schema(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: ToolInputSchema::object(
                json!({
                    "query": {"type": "string", "description": "What to look for"},
                    "k": {"type": "integer", "description": "Number of chunks to return"}
                }),
                &["query"],
            ),
        }
    }

    async fn execute(&self, input: &Value) -> ToolOutcome {
        let query = match required_str(input, "query") {
            Ok(q) => q,
            Err(outcome) => return outcome,
        };
        let k = input
            .get("k")
            .and_then(Value::as_u64)
            .map(|k| (k as usize).min(MAX_K))
            .unwrap_or(self.default_k);

        let chunks = match self.knowledge_base.similarity_search(query, k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                return ToolOutcome::transient_error(format!("Error searching knowledge base: {:#}", e))
            }
        };

        if chunks.is_empty() {
            return ToolOutcome::ok("No relevant documents found in knowledge base.".to_string());
        }

        let results = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| format!("Document {} (from {}):\n{}", i + 1, c.filename, c.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut sources: Vec<String> = Vec::new();
        for c in &chunks {
            if !sources.contains(&c.doc_id) {
                sources.push(c.doc_id.clone());
            }
        }

        ToolOutcome::ok(format!("Knowledge Base Results: \n{}", results)).with_sources(sources)
    }
}
