use crate::sqlite::open_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lumen_core::{AnalyticsRecorder, AnalyticsReport, QueryRecord, ToolUsage};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

/// Per-query usage counters kept in SQLite.
#[derive(Clone)]
pub struct SqliteAnalytics {
    pool: Pool<Sqlite>,
}

impl SqliteAnalytics {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let pool = open_pool(db_path).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                query TEXT NOT NULL,
                answer TEXT,
                tool_calls INTEGER NOT NULL DEFAULT 0,
                reasoning_steps INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create agent_queries table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_tool_usage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query_id INTEGER NOT NULL REFERENCES agent_queries(id),
                tool_name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create agent_tool_usage table")?;

        Ok(())
    }
}

#[async_trait]
impl AnalyticsRecorder for SqliteAnalytics {
    async fn record(&self, record: &QueryRecord) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let query_id = sqlx::query(
            r#"
            INSERT INTO agent_queries (session_id, query, answer, tool_calls, reasoning_steps, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.session_id)
        .bind(&record.query)
        .bind(&record.answer)
        .bind(record.summary.total_tool_calls as i64)
        .bind(record.summary.reasoning_steps as i64)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to insert query record")?
        .last_insert_rowid();

        for tool in &record.summary.distinct_tools {
            sqlx::query("INSERT INTO agent_tool_usage (query_id, tool_name, created_at) VALUES (?, ?, ?)")
                .bind(query_id)
                .bind(tool)
                .bind(now)
                .execute(&mut *tx)
                .await
                .context("Failed to insert tool usage")?;
        }

        tx.commit().await?;
        tracing::debug!(
            "Recorded query {} ({} tool calls, {} distinct)",
            query_id,
            record.summary.total_tool_calls,
            record.summary.distinct_tools.len()
        );
        Ok(())
    }

    async fn report(&self) -> Result<AnalyticsReport> {
        let total_queries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agent_queries")
            .fetch_one(&self.pool)
            .await?;

        let avg: Option<f64> = sqlx::query_scalar("SELECT AVG(tool_calls) FROM agent_queries")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT tool_name, COUNT(*) AS usage_count
            FROM agent_tool_usage
            GROUP BY tool_name
            ORDER BY usage_count DESC, tool_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate tool usage")?;

        let tool_usage = rows
            .iter()
            .map(|r| ToolUsage {
                tool: r.get("tool_name"),
                count: r.get("usage_count"),
            })
            .collect();

        Ok(AnalyticsReport {
            total_queries,
            avg_tools_per_query: (avg.unwrap_or(0.0) * 100.0).round() / 100.0,
            tool_usage,
        })
    }
}
