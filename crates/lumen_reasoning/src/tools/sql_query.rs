//! Natural-language to SQL tool: schema lookup, generation, a read-only
//! policy gate, execution and result formatting. Every failure becomes error
//! text; nothing escapes to the caller.

use crate::api_types::Message;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::{sql_generation_prompt, SQL_SYSTEM_PROMPT};
use lumen_core::config::SqlToolConfig;
use lumen_core::tools::required_str;
use lumen_core::{QueryRows, SqlDatabase, Tool, ToolHandler, ToolInputSchema, ToolKind, ToolOutcome};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};

static RE_CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)```(?:sql)?").unwrap());

const POLICY_VIOLATION: &str = "Only SELECT queries are allowed for safety";

#[derive(Debug, Clone)]
pub struct SqlToolSettings {
    pub read_only: bool,
    /// Rows kept from the result set.
    pub max_rows: usize,
    /// Rows shown inline in the tool output.
    pub preview_rows: usize,
}

impl Default for SqlToolSettings {
    fn default() -> Self {
        Self {
            read_only: true,
            max_rows: 100,
            preview_rows: 10,
        }
    }
}

const MAX_ROWS_LIMIT: usize = 100;

/// `max_rows` is clamped to `1..=100` and `preview_rows` to at most `max_rows`.
impl From<&SqlToolConfig> for SqlToolSettings {
    fn from(config: &SqlToolConfig) -> Self {
        let max_rows = config.max_rows.clamp(1, MAX_ROWS_LIMIT);
        Self {
            read_only: config.read_only,
            max_rows,
            preview_rows: config.preview_rows.min(max_rows),
        }
    }
}

pub struct SqlQueryTool {
    database: Arc<dyn SqlDatabase>,
    llm: Arc<dyn LlmClient>,
    params: CompletionParams,
    settings: SqlToolSettings,
}

impl SqlQueryTool {
    pub fn new(
        database: Arc<dyn SqlDatabase>,
        llm: Arc<dyn LlmClient>,
        params: CompletionParams,
        settings: SqlToolSettings,
    ) -> Self {
        Self {
            database,
            llm,
            params,
            settings,
        }
    }

    async fn generate(&self, request: &str) -> anyhow::Result<String> {
        let schema = self.database.schema_description().await?;
        let prompt = sql_generation_prompt(&schema, request);
        let raw = self
            .llm
            .complete(SQL_SYSTEM_PROMPT, vec![Message::user(prompt)], self.params.clone())
            .await?;
        let sql = strip_code_fences(&raw);
        anyhow::ensure!(!sql.is_empty(), "model returned an empty query");
        Ok(sql)
    }

    fn format_rows(&self, sql: &str, result: &QueryRows) -> String {
        let mut out = format!(
            "Query executed successfully!\n\nSQL Query: {}\nRows returned: {}\n\n",
            sql, result.row_count
        );
        if result.rows.is_empty() {
            out.push_str("No results found.");
            return out;
        }

        out.push_str("Results:\n");
        for (i, row) in result.rows.iter().take(self.settings.preview_rows).enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, row));
        }
        if result.row_count > self.settings.preview_rows {
            out.push_str(&format!(
                "\n...and {} more rows",
                result.row_count - self.settings.preview_rows
            ));
        }
        out
    }
}

/// Remove markdown code fences (```sql / ```) and surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    RE_CODE_FENCE.replace_all(raw, "").trim().to_string()
}

/// True when `sql` starts with SELECT. This is a lexical prefix check only;
/// stacked writes after a SELECT are stopped by the read-only connection.
pub fn is_read_only_statement(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}

#[async_trait::async_trait]
impl ToolHandler for SqlQueryTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SqlQuery
    }

    fn description(&self) -> &str {
        "Generate and execute SQL queries from natural language. Use this when the user asks \
         questions about database data, wants to query tables, or needs data analysis. \
         Examples: \"Show me all users who signed up last month\", \"What are the top 5 products \
         by sales?\""
    }

    fn schema(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: ToolInputSchema::object(
                json!({
                    "natural_language_query": {
                        "type": "string",
                        "description": "The data question in plain language"
                    }
                }),
                &["natural_language_query"],
            ),
        }
    }

    async fn execute(&self, input: &Value) -> ToolOutcome {
        let request = match required_str(input, "natural_language_query") {
            Ok(r) => r,
            Err(outcome) => return outcome,
        };

        let sql = match self.generate(request).await {
            Ok(sql) => sql,
            Err(e) => return ToolOutcome::transient_error(format!("Error in SQL query generation: {:#}", e)),
        };
        tracing::debug!("Generated SQL: {}", sql);

        if self.settings.read_only && !is_read_only_statement(&sql) {
            tracing::warn!("Refusing to run non-SELECT statement: {}", sql);
            return ToolOutcome::permanent_error(format!(
                "Error executing query: {}\nGenerated Query: {}",
                POLICY_VIOLATION, sql
            ));
        }

        match self.database.fetch_rows(&sql, self.settings.max_rows).await {
            Ok(result) => ToolOutcome::ok(self.format_rows(&sql, &result)),
            Err(e) => ToolOutcome::permanent_error(format!(
                "Error executing query: {:#}\nGenerated Query: {}",
                e, sql
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;
    use anyhow::Result;
    use lumen_core::SqlRow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDb {
        rows: usize,
        executed: AtomicUsize,
        fail_schema: bool,
    }

    impl FakeDb {
        fn with_rows(rows: usize) -> Arc<Self> {
            Arc::new(Self {
                rows,
                executed: AtomicUsize::new(0),
                fail_schema: false,
            })
        }
    }

    #[async_trait::async_trait]
    impl SqlDatabase for FakeDb {
        async fn schema_description(&self) -> Result<String> {
            if self.fail_schema {
                anyhow::bail!("database unavailable");
            }
            Ok("Table: users\nColumns: id (INTEGER), name (TEXT)".into())
        }

        async fn fetch_rows(&self, _sql: &str, max_rows: usize) -> Result<QueryRows> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            let rows = (1..=self.rows.min(max_rows))
                .map(|i| SqlRow {
                    columns: vec![("id".into(), json!(i)), ("name".into(), json!(format!("user{i}")))],
                })
                .collect();
            Ok(QueryRows {
                row_count: self.rows,
                rows,
            })
        }
    }

    fn tool(db: Arc<FakeDb>, generated: &str) -> SqlQueryTool {
        let llm = MockProvider::scripted("sql", vec![Message::assistant(generated, vec![])]);
        SqlQueryTool::new(db, Arc::new(llm), CompletionParams::default(), SqlToolSettings::default())
    }

    fn ask(q: &str) -> Value {
        json!({ "natural_language_query": q })
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(strip_code_fences("```SELECT 2```"), "SELECT 2");
        assert_eq!(strip_code_fences("  SELECT 3  "), "SELECT 3");
    }

    #[test]
    fn test_settings_from_config_are_clamped() {
        let mut config = SqlToolConfig::default();
        config.max_rows = 0;
        config.preview_rows = 10;
        let s = SqlToolSettings::from(&config);
        assert_eq!((s.max_rows, s.preview_rows), (1, 1));

        config.max_rows = 500;
        config.preview_rows = 20;
        let s = SqlToolSettings::from(&config);
        assert_eq!((s.max_rows, s.preview_rows), (100, 20));

        config.max_rows = 5;
        config.preview_rows = 10;
        let s = SqlToolSettings::from(&config);
        assert_eq!((s.max_rows, s.preview_rows), (5, 5));
    }

    #[tokio::test]
    async fn test_preview_never_exceeds_retained_rows() {
        let mut config = SqlToolConfig::default();
        config.max_rows = 5;
        config.preview_rows = 10;
        let llm = MockProvider::scripted("sql", vec![Message::assistant("SELECT * FROM users", vec![])]);
        let tool = SqlQueryTool::new(
            FakeDb::with_rows(12),
            Arc::new(llm),
            CompletionParams::default(),
            SqlToolSettings::from(&config),
        );
        let out = tool.execute(&ask("users")).await;
        assert!(out.content.contains("Rows returned: 12"));
        assert!(out.content.contains("5. {id: 5, name: user5}\n"));
        assert!(out.content.ends_with("\n...and 7 more rows"));
    }

    #[test]
    fn test_read_only_gate() {
        assert!(is_read_only_statement("SELECT * FROM users"));
        assert!(is_read_only_statement("  select id from users;"));
        assert!(!is_read_only_statement("DROP TABLE users"));
        assert!(!is_read_only_statement("WITH x AS (SELECT 1) DELETE FROM users"));
        assert!(is_read_only_statement("SELECT * FROM users WHERE name = 'a;b'"));
        assert!(!is_read_only_statement("SEL"));
        assert!(!is_read_only_statement("选择"));
    }

    #[tokio::test]
    async fn test_policy_violation_never_executes() {
        let db = FakeDb::with_rows(3);
        let out = tool(db.clone(), "DROP TABLE users").execute(&ask("remove users")).await;
        assert!(out.is_error);
        assert_eq!(
            out.content,
            "Error executing query: Only SELECT queries are allowed for safety\nGenerated Query: DROP TABLE users"
        );
        assert_eq!(db.executed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_large_result_is_previewed() {
        let db = FakeDb::with_rows(123);
        let out = tool(db, "```sql\nSELECT id, name FROM users\n```")
            .execute(&ask("all users"))
            .await;
        assert!(!out.is_error);
        assert!(out.content.starts_with(
            "Query executed successfully!\n\nSQL Query: SELECT id, name FROM users\nRows returned: 123\n\nResults:\n"
        ));
        assert!(out.content.contains("1. {id: 1, name: user1}\n"));
        assert!(out.content.contains("10. {id: 10, name: user10}\n"));
        assert!(!out.content.contains("11. "));
        assert!(out.content.ends_with("\n...and 113 more rows"));
    }

    #[tokio::test]
    async fn test_zero_rows() {
        let out = tool(FakeDb::with_rows(0), "SELECT * FROM users WHERE id < 0")
            .execute(&ask("nobody"))
            .await;
        assert!(out.content.ends_with("Rows returned: 0\n\nNo results found."));
    }

    #[tokio::test]
    async fn test_schema_failure_is_generation_error() {
        let db = Arc::new(FakeDb {
            rows: 0,
            executed: AtomicUsize::new(0),
            fail_schema: true,
        });
        let out = tool(db, "SELECT 1").execute(&ask("x")).await;
        assert!(out.is_error);
        assert_eq!(out.content, "Error in SQL query generation: database unavailable");
    }

    #[tokio::test]
    async fn test_empty_generation_is_error() {
        let out = tool(FakeDb::with_rows(1), "```sql\n```").execute(&ask("x")).await;
        assert!(out.content.starts_with("Error in SQL query generation:"));
    }

    #[tokio::test]
    async fn test_write_allowed_when_not_read_only() {
        let db = FakeDb::with_rows(0);
        let llm = MockProvider::scripted("sql", vec![Message::assistant("UPDATE users SET name = 'x'", vec![])]);
        let settings = SqlToolSettings {
            read_only: false,
            ..SqlToolSettings::default()
        };
        let tool = SqlQueryTool::new(db.clone(), Arc::new(llm), CompletionParams::default(), settings);
        let out = tool.execute(&ask("rename everyone")).await;
        assert!(!out.is_error);
        assert_eq!(db.executed.load(Ordering::SeqCst), 1);
    }
}
