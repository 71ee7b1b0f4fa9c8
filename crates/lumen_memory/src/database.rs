use crate::sqlite::connect;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use lumen_core::{QueryRows, SqlDatabase, SqlRow};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Pool, Row, Sqlite, TypeInfo, ValueRef};

/// Business database queried by the SQL tool.
pub struct SqliteDatabase {
    pool: Pool<Sqlite>,
    /// Tables exposed in the schema description; empty means all of them.
    allowed_tables: Vec<String>,
}

impl SqliteDatabase {
    pub async fn connect(db_url: &str, read_only: bool, allowed_tables: Vec<String>) -> Result<Self> {
        let pool = connect(db_url, read_only).await?;
        tracing::info!(
            "SQL tool database connected (read_only={}, tables={})",
            read_only,
            if allowed_tables.is_empty() { "all".to_string() } else { allowed_tables.join(",") }
        );
        Ok(Self { pool, allowed_tables })
    }

    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool, allowed_tables: Vec::new() }
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tables")?;

        Ok(names
            .into_iter()
            .filter(|n| self.allowed_tables.is_empty() || self.allowed_tables.iter().any(|a| a == n))
            .collect())
    }
}

#[async_trait]
impl SqlDatabase for SqliteDatabase {
    async fn schema_description(&self) -> Result<String> {
        let mut blocks = Vec::new();
        for table in self.table_names().await? {
            let pragma = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
            let columns = sqlx::query(&pragma)
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("Failed to inspect table {table}"))?;
            let cols: Vec<String> = columns
                .iter()
                .map(|c| {
                    let name: String = c.get("name");
                    let ty: String = c.get("type");
                    format!("{} ({})", name, if ty.is_empty() { "ANY" } else { ty.as_str() })
                })
                .collect();
            blocks.push(format!("Table: {}\nColumns: {}", table, cols.join(", ")));
        }
        Ok(blocks.join("\n\n"))
    }

    async fn fetch_rows(&self, sql: &str, max_rows: usize) -> Result<QueryRows> {
        let mut stream = sqlx::query(sql).fetch(&self.pool);
        let mut result = QueryRows::default();
        while let Some(row) = stream.try_next().await? {
            result.row_count += 1;
            if result.rows.len() < max_rows {
                result.rows.push(convert_row(&row)?);
            }
        }
        Ok(result)
    }
}

fn convert_row(row: &SqliteRow) -> Result<SqlRow> {
    let mut columns = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(i)?),
                "REAL" => Value::from(row.try_get::<f64, _>(i)?),
                "BLOB" => Value::String(format!("<{} bytes>", row.try_get::<Vec<u8>, _>(i)?.len())),
                _ => Value::String(row.try_get::<String, _>(i)?),
            }
        };
        columns.push((column.name().to_string(), value));
    }
    Ok(SqlRow { columns })
}
