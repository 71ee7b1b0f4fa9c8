use lumen_core::{Tool, ToolKind};

/// System instruction for the reasoning loop, listing only the tools that
/// are actually registered.
pub fn agent_system_prompt(tools: &[Tool]) -> String {
    let mut prompt = String::from("You are an intelligent assistant");
    if tools.is_empty() {
        prompt.push_str(". No tools are available; answer from your own knowledge.\n");
        return prompt;
    }

    prompt.push_str(" with access to:\n");
    for (i, tool) in tools.iter().enumerate() {
        let label = match ToolKind::from_name(&tool.name) {
            Some(ToolKind::KnowledgeBase) => "Internal knowledge base (documents uploaded by users)",
            Some(ToolKind::WebSearch) => "Web search (for current information)",
            Some(ToolKind::SqlQuery) => "SQL database query (for data analysis and database questions)",
            None => tool.description.as_str(),
        };
        prompt.push_str(&format!("{}. {} [{}]\n", i + 1, label, tool.name));
    }

    prompt.push_str("\nIMPORTANT:\n");
    let has = |kind: ToolKind| tools.iter().any(|t| t.name == kind.name());
    if has(ToolKind::KnowledgeBase) {
        prompt.push_str("- ALWAYS search the knowledge base FIRST for any document-related questions\n");
    }
    if has(ToolKind::WebSearch) {
        prompt.push_str("- Use web search for current events, news, or when the knowledge base has no results\n");
    }
    if has(ToolKind::SqlQuery) {
        prompt.push_str("- Use SQL queries when users ask about database data, analytics, or data analysis\n");
    }
    prompt.push_str("- Use multiple tools if needed\n");
    prompt.push_str("- Provide comprehensive answers with source citations\n");
    prompt
}

pub const SQL_SYSTEM_PROMPT: &str = "You translate requests into SQL for the given schema.";

/// Prompt asking the model for exactly one read-only statement.
pub fn sql_generation_prompt(schema: &str, request: &str) -> String {
    format!(
        "Given this database schema:\n\n{schema}\n\n\
         Generate a SQL query for this request: \"{request}\"\n\n\
         Requirements:\n\
         - Return ONLY the SQL query, no explanation\n\
         - Use SQLite syntax\n\
         - Only a single SELECT statement (no INSERT, UPDATE, DELETE, DROP)\n\
         - Be precise and efficient\n\n\
         SQL Query:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::ToolInputSchema;
    use serde_json::json;

    fn tool(kind: ToolKind) -> Tool {
        Tool {
            name: kind.name().into(),
            description: String::new(),
            input_schema: ToolInputSchema::object(json!({}), &[]),
        }
    }

    #[test]
    fn test_prompt_lists_only_registered_tools() {
        let prompt = agent_system_prompt(&[tool(ToolKind::KnowledgeBase), tool(ToolKind::WebSearch)]);
        assert!(prompt.contains("search_knowledge_base"));
        assert!(prompt.contains("search_web"));
        assert!(!prompt.contains("sql_query_generator"));
        assert!(!prompt.contains("SQL queries"));
        assert!(prompt.contains("knowledge base FIRST"));
    }

    #[test]
    fn test_prompt_without_tools() {
        assert!(agent_system_prompt(&[]).contains("No tools are available"));
    }

    #[test]
    fn test_sql_prompt_embeds_schema_and_request() {
        let p = sql_generation_prompt("Table: users\nColumns: id (INTEGER)", "count users");
        assert!(p.contains("Table: users"));
        assert!(p.contains("\"count users\""));
        assert!(p.ends_with("SQL Query:"));
    }
}
