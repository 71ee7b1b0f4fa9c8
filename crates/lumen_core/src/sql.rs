use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// One result row, columns kept in select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlRow {
    pub columns: Vec<(String, Value)>,
}

impl SqlRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }
}

impl fmt::Display for SqlRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::String(s) => write!(f, "{name}: {s}")?,
                other => write!(f, "{name}: {other}")?,
            }
        }
        f.write_str("}")
    }
}

/// Rows produced by a statement. `row_count` counts every row the statement
/// produced, `rows` holds at most the caller's cap.
#[derive(Debug, Clone, Default)]
pub struct QueryRows {
    pub row_count: usize,
    pub rows: Vec<SqlRow>,
}

/// The relational database targeted by the natural-language SQL tool.
#[async_trait]
pub trait SqlDatabase: Send + Sync {
    /// Textual schema: one `Table: <name>\nColumns: <col> (<type>), ...`
    /// block per table, blocks separated by a blank line.
    async fn schema_description(&self) -> Result<String>;

    /// Run a statement, keeping at most `max_rows` rows.
    async fn fetch_rows(&self, sql: &str, max_rows: usize) -> Result<QueryRows>;
}
