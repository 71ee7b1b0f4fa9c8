use lumen_core::{Tool, ToolHandler, ToolKind, ToolOutcome};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("tool handler '{name}' does not match its kind '{kind}'")]
    NameMismatch { name: String, kind: ToolKind },
    #[error("tool '{0}' is already registered")]
    Duplicate(ToolKind),
}

/// Ordered set of tool handlers, at most one per [`ToolKind`].
#[derive(Default)]
pub struct ToolRegistry {
    handlers: Vec<(ToolKind, Box<dyn ToolHandler>)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Rejects a handler whose name disagrees with its
    /// kind, or a kind that is already present.
    pub fn register(&mut self, handler: Box<dyn ToolHandler>) -> Result<(), RegistryError> {
        let kind = handler.kind();
        if handler.name() != kind.name() || handler.schema().name != kind.name() {
            return Err(RegistryError::NameMismatch {
                name: handler.name().to_string(),
                kind,
            });
        }
        if self.handlers.iter().any(|(k, _)| *k == kind) {
            return Err(RegistryError::Duplicate(kind));
        }
        tracing::debug!("Registered tool: {} ({})", kind, handler.description());
        self.handlers.push((kind, handler));
        Ok(())
    }

    /// Tool schemas for the model, in registration order.
    pub fn available_tools(&self) -> Vec<Tool> {
        self.handlers.iter().map(|(_, h)| h.schema()).collect()
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        self.handlers.iter().map(|(k, _)| *k).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatch a tool call by name. Never fails: unknown names come back as
    /// error outcomes.
    #[tracing::instrument(skip(self, input), fields(tool = name))]
    pub async fn dispatch(&self, name: &str, input: &serde_json::Value) -> ToolOutcome {
        let Some(handler) = ToolKind::from_name(name)
            .and_then(|kind| self.handlers.iter().find(|(k, _)| *k == kind))
            .map(|(_, h)| h)
        else {
            tracing::warn!("Model requested unknown tool '{}'", name);
            return ToolOutcome::permanent_error(format!("Unknown tool: {}", name));
        };

        let outcome = handler.execute(input).await;
        if outcome.is_error {
            tracing::warn!("Tool '{}' failed ({:?}): {}", name, outcome.error_kind, outcome.content);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::ToolInputSchema;
    use serde_json::{json, Value};

    struct FakeTool {
        kind: ToolKind,
        name: &'static str,
    }

    #[async_trait::async_trait]
    impl ToolHandler for FakeTool {
        fn kind(&self) -> ToolKind {
            self.kind
        }
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "fake"
        }
        fn schema(&self) -> Tool {
            Tool {
                name: self.name.to_string(),
                description: "fake".into(),
                input_schema: ToolInputSchema::object(json!({}), &[]),
            }
        }
        async fn execute(&self, input: &Value) -> ToolOutcome {
            ToolOutcome::ok(format!("{} got {}", self.name, input))
        }
    }

    fn fake(kind: ToolKind) -> Box<FakeTool> {
        Box::new(FakeTool {
            kind,
            name: kind.name(),
        })
    }

    #[test]
    fn test_register_validates() {
        let mut registry = ToolRegistry::default();
        registry.register(fake(ToolKind::WebSearch)).unwrap();
        registry.register(fake(ToolKind::KnowledgeBase)).unwrap();

        assert_eq!(
            registry.register(fake(ToolKind::WebSearch)),
            Err(RegistryError::Duplicate(ToolKind::WebSearch))
        );
        let mislabeled = Box::new(FakeTool {
            kind: ToolKind::SqlQuery,
            name: "run_sql",
        });
        assert!(matches!(
            registry.register(mislabeled),
            Err(RegistryError::NameMismatch { .. })
        ));

        let names: Vec<String> = registry.available_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["search_web", "search_knowledge_base"]);
        assert_eq!(registry.kinds(), vec![ToolKind::WebSearch, ToolKind::KnowledgeBase]);
    }

    #[tokio::test]
    async fn test_dispatch_known_and_unknown() {
        let mut registry = ToolRegistry::default();
        registry.register(fake(ToolKind::WebSearch)).unwrap();

        let ok = registry.dispatch("search_web", &json!({"query": "q"})).await;
        assert!(!ok.is_error);
        assert!(ok.content.starts_with("search_web got"));

        let unknown = registry.dispatch("delete_everything", &json!({})).await;
        assert!(unknown.is_error);
        assert_eq!(unknown.content, "Unknown tool: delete_everything");

        // a valid name whose tool is not registered is unknown too
        let unregistered = registry.dispatch("sql_query_generator", &json!({})).await;
        assert_eq!(unregistered.content, "Unknown tool: sql_query_generator");
    }
}
