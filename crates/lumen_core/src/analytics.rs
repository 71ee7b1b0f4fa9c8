use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Summary statistics derived from one completed query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    /// Count of every tool invocation request across all assistant messages.
    pub total_tool_calls: usize,
    /// Distinct tool names, first-seen order.
    pub distinct_tools: Vec<String>,
    /// floor(transcript length / 2).
    pub reasoning_steps: usize,
}

/// What the recorder persists for a single answered query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub session_id: String,
    pub query: String,
    pub answer: String,
    pub summary: AnalyticsSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub tool: String,
    pub count: i64,
}

/// Aggregate counters across all recorded queries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub total_queries: i64,
    pub avg_tools_per_query: f64,
    pub tool_usage: Vec<ToolUsage>,
}

/// Persistence collaborator for per-query analytics.
#[async_trait]
pub trait AnalyticsRecorder: Send + Sync {
    async fn record(&self, record: &QueryRecord) -> Result<()>;
    async fn report(&self) -> Result<AnalyticsReport>;
}
