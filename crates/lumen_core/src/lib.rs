pub mod analytics;
pub mod config;
pub mod knowledge;
pub mod search;
pub mod sql;
pub mod tools;

pub use analytics::{AnalyticsRecorder, AnalyticsReport, AnalyticsSummary, QueryRecord, ToolUsage};
pub use config::LumenConfig;
pub use knowledge::{DocumentChunk, KnowledgeBase};
pub use search::{SearchHit, WebSearch};
pub use sql::{QueryRows, SqlDatabase, SqlRow};
pub use tools::{Tool, ToolErrorKind, ToolHandler, ToolInputSchema, ToolKind, ToolOutcome};
